use prost::Message;

use crate::error::ResolutionError;

/// Record the HDFS failover controller writes under its election path.
#[derive(Clone, PartialEq, Message)]
pub struct ActiveNodeInfo {
    #[prost(string, required, tag = "1")]
    pub nameservice_id: String,
    #[prost(string, required, tag = "2")]
    pub namenode_id: String,
    #[prost(string, required, tag = "3")]
    pub hostname: String,
    #[prost(int32, required, tag = "4")]
    pub port: i32,
    #[prost(int32, required, tag = "5")]
    pub zkfc_port: i32,
}

impl ActiveNodeInfo {
    pub fn with_hostname(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            ..Default::default()
        }
    }
}

pub fn decode_leader(data: &[u8]) -> Result<ActiveNodeInfo, ResolutionError> {
    let info = ActiveNodeInfo::decode(data)?;
    if info.hostname.trim().is_empty() {
        return Err(ResolutionError::EmptyHostname);
    }
    Ok(info)
}

pub fn encode_leader(info: &ActiveNodeInfo) -> Vec<u8> {
    info.encode_to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_full_record() {
        let info = ActiveNodeInfo {
            nameservice_id: "ns1".to_string(),
            namenode_id: "nn2".to_string(),
            hostname: "namenode-2.example.com".to_string(),
            port: 8020,
            zkfc_port: 8019,
        };
        let decoded = decode_leader(&encode_leader(&info)).unwrap();
        assert_eq!(decoded, info);
    }

    #[test]
    fn hostname_only_record_is_accepted() {
        let data = encode_leader(&ActiveNodeInfo::with_hostname("localhost"));
        assert_eq!(decode_leader(&data).unwrap().hostname, "localhost");
    }

    #[test]
    fn missing_hostname_is_rejected() {
        let info = ActiveNodeInfo {
            nameservice_id: "ns1".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            decode_leader(&encode_leader(&info)),
            Err(ResolutionError::EmptyHostname)
        ));
    }

    #[test]
    fn garbage_is_a_decode_error() {
        assert!(matches!(
            decode_leader(&[0xff, 0xff, 0xff]),
            Err(ResolutionError::Decode(_))
        ));
    }
}

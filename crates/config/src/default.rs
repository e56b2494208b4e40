// default values
pub fn get_default_log_level() -> String {
    String::from("info")
}

pub fn get_default_listen_address() -> String {
    String::from("0.0.0.0")
}

pub fn get_default_zk_connect_timeout_ms() -> u64 {
    1000
}

// fallback interval for re-reading the lock path when a watch is missed
pub fn get_default_poll_interval_ms() -> u64 {
    3000
}

pub fn get_default_cancel_on_timeout() -> bool {
    false
}

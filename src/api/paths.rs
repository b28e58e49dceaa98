//! All Paths are recorded here for use throughout this codebase
pub mod base {
    pub const ROOT: &str = "/";
    pub const HEALTH: &str = "/health";
    pub const ABOUT: &str = "/about";
}

pub mod consensus {
    pub const PROPOSE: &str = "/propose";
    pub const STATE: &str = "/state";
    pub const STATE_KEY: &str = "/state/:key";
    pub const PEERS: &str = "/peers";
    pub const STATUS: &str = "/status";
}

pub fn state_key_path(key: &str) -> String {
    consensus::STATE_KEY.replace(":key", key)
}

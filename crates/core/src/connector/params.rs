use serde_json::{json, Value};

/// Protocol version reported to clients on init.
pub const API_VERSION: &str = "2.0";

/// Maximum accepted upload size, reported to clients on init.
/// Enforcement happens at the transport layer.
pub const UPLOAD_MAX_SIZE: &str = "1024M";

/// The parameter names the dispatcher will read from a request.
/// Anything else in the bag is ignored.
pub const ALLOWED_PARAMS: &[&str] = &[
    "cmd", "target", "targets[]", "tree", "name", "src", "dst", "cut", "init", "q", "root",
    "width", "height", "upload[]",
];

/// Fixed environment metadata merged into the first response of a
/// session (requests carrying the `init` flag).
pub fn init_params() -> Value {
    json!({
        "api": API_VERSION,
        "uplMaxSize": UPLOAD_MAX_SIZE,
        "options": {
            "separator": "/",
            "disabled": [],
            "archivers": { "create": [], "extract": [] },
            "copyOverwrite": 1,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_params_shape() {
        let params = init_params();
        assert_eq!(params["api"], "2.0");
        assert_eq!(params["uplMaxSize"], "1024M");
        assert_eq!(params["options"]["separator"], "/");
    }
}

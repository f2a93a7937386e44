//! FTP Response handling
//!
//! Defines FTP response codes and formatting.

pub const FILE_STATUS_OKAY: u16 = 150;
pub const OK: u16 = 200;
pub const FILE_STATUS: u16 = 213;
pub const SYSTEM_TYPE: u16 = 215;
pub const READY: u16 = 220;
pub const GOODBYE: u16 = 221;
pub const TRANSFER_COMPLETE: u16 = 226;
pub const ENTERING_PASSIVE: u16 = 227;
pub const LOGIN_SUCCESS: u16 = 230;
pub const SERVICE_TERMINATED: u16 = 231;
pub const FILE_ACTION_OK: u16 = 250;
pub const PATH_CREATED: u16 = 257;
pub const PASSWORD_REQUIRED: u16 = 331;
pub const PENDING_FURTHER_INFO: u16 = 350;
pub const CANT_OPEN_DATA: u16 = 425;
pub const TRANSFER_ABORTED: u16 = 426;
pub const INVALID_CREDENTIALS: u16 = 430;
pub const FILE_UNAVAILABLE: u16 = 450;
pub const LOCAL_ERROR: u16 = 451;
pub const SYNTAX_ERROR: u16 = 500;
pub const ARGUMENT_ERROR: u16 = 501;
pub const BAD_SEQUENCE: u16 = 503;
pub const NOT_IMPLEMENTED_FOR_PARAM: u16 = 504;
pub const AUTH_FAILED: u16 = 530;
pub const FILE_NOT_FOUND: u16 = 550;
pub const NAME_NOT_ALLOWED: u16 = 553;

/// Format an FTP response message
pub fn format_response(code: u16, message: &str) -> String {
    format!("{} {}\r\n", code, message)
}

/// Reply to FEAT. Permitted before login.
pub fn features() -> &'static str {
    "211-Features:\r\n  MLSD\r\n  MDTM\r\n  SITE\r\n  SIZE\r\n211 End.\r\n"
}

/// Leading integer of a reply line, if any.
pub fn reply_code(line: &str) -> Option<i16> {
    let digits: String = line
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_response() {
        assert_eq!(format_response(OK, "Zzz..."), "200 Zzz...\r\n");
    }

    #[test]
    fn test_reply_code() {
        assert_eq!(reply_code("227 Entering Passive Mode (1,2,3,4,5,6)."), Some(227));
        assert_eq!(reply_code("211-Features:"), Some(211));
        assert_eq!(reply_code("hello"), None);
    }
}

//! Module `command`
//!
//! The FTP command table and the outcome a handler reports back to the
//! control state machine.

/// Represents an FTP command recognised by the server.
///
/// Parameters are kept apart in [`ParsedCommand`]; the variant only names
/// the verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    USER,
    PASS,
    QUIT,
    NOOP,
    CDUP,
    CWD,
    PWD,
    MODE,
    STRU,
    TYPE,
    PASV,
    PORT,
    ABOR,
    DELE,
    LIST,
    NLST,
    MLSD,
    RETR,
    STOR,
    MKD,
    RMD,
    RNFR,
    RNTO,
    FEAT,
    MDTM,
    SIZE,
    SITE,
    SYST,
    UNKNOWN,
}

impl Command {
    /// Looks up an already upper-cased command token.
    pub fn from_token(token: &str) -> Self {
        match token {
            "USER" => Command::USER,
            "PASS" => Command::PASS,
            "QUIT" => Command::QUIT,
            "NOOP" => Command::NOOP,
            "CDUP" => Command::CDUP,
            "CWD" => Command::CWD,
            "PWD" => Command::PWD,
            "MODE" => Command::MODE,
            "STRU" => Command::STRU,
            "TYPE" => Command::TYPE,
            "PASV" => Command::PASV,
            "PORT" => Command::PORT,
            "ABOR" => Command::ABOR,
            "DELE" => Command::DELE,
            "LIST" => Command::LIST,
            "NLST" => Command::NLST,
            "MLSD" => Command::MLSD,
            "RETR" => Command::RETR,
            "STOR" => Command::STOR,
            "MKD" => Command::MKD,
            "RMD" => Command::RMD,
            "RNFR" => Command::RNFR,
            "RNTO" => Command::RNTO,
            "FEAT" => Command::FEAT,
            "MDTM" => Command::MDTM,
            "SIZE" => Command::SIZE,
            "SITE" => Command::SITE,
            "SYST" => Command::SYST,
            _ => Command::UNKNOWN,
        }
    }
}

/// One complete command line as read from the control connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub command: Command,
    /// The upper-cased verb as the peer sent it.
    pub token: String,
    pub params: String,
}

impl ParsedCommand {
    pub fn new(token: &str, params: &str) -> Self {
        let token = token.to_ascii_uppercase();
        Self {
            command: Command::from_token(&token),
            token,
            params: params.to_string(),
        }
    }
}

/// Represents the outcome of running one command handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandStatus {
    /// Fully handled; the next command line may be read.
    Completed,
    /// Fully handled, but the command was rejected. Login gating does not
    /// advance and the idle timer is left alone.
    Unaccepted,
    /// Not finished yet; run the same command again on the next tick.
    Pending,
    /// Run this command instead on the next tick.
    Alias(ParsedCommand),
    /// Terminate the control session.
    CloseConnection,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_token() {
        assert_eq!(Command::from_token("MLSD"), Command::MLSD);
        assert_eq!(Command::from_token("CWD"), Command::CWD);
        assert_eq!(Command::from_token("XYZ"), Command::UNKNOWN);
        assert_eq!(Command::from_token("mlsd"), Command::UNKNOWN);
    }

    #[test]
    fn test_parsed_command_normalises_case() {
        let cmd = ParsedCommand::new("stor", "file.bin");
        assert_eq!(cmd.command, Command::STOR);
        assert_eq!(cmd.token, "STOR");
        assert_eq!(cmd.params, "file.bin");
    }
}

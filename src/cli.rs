//! CLI argument definitions using clap derive macros.

use std::fmt;
use std::path::PathBuf;

use clap::{ArgAction, Parser};

/// Submit an assessment to the York Computer Science teaching portal.
///
/// Logs in through the university single sign-on when needed, confirms the
/// exam number, then uploads the file. Session cookies are kept between runs
/// so later submissions usually skip the login.
#[derive(Parser)]
#[command(name = "assessment-uploader")]
#[command(author, version, about)]
pub struct Args {
    /// Submit page, as a full URL or the part after the portal's student base,
    /// e.g. 2021-2/submit/COM00012C/901/A
    #[arg(
        short = 'n',
        long,
        required_unless_present_any = ["delete_cookies", "delete_from_keyring"]
    )]
    pub submit_url: Option<String>,

    /// Username, e.g. ab1234 (prompted when needed)
    #[arg(short, long)]
    pub username: Option<String>,

    /// Password (prompted when needed; prefer the keyring over this flag)
    #[arg(long)]
    pub password: Option<String>,

    /// Exam number, e.g. Y1234567 (prompted when needed)
    #[arg(short, long)]
    pub exam_number: Option<String>,

    /// File to upload
    #[arg(short, long, default_value = "exam.zip")]
    pub file: PathBuf,

    /// Log in and confirm the exam number, but skip the upload itself
    #[arg(long)]
    pub dry_run: bool,

    /// Don't read or store the password and exam number in the system keyring
    #[arg(long = "no-use-keyring", action = ArgAction::SetFalse)]
    pub use_keyring: bool,

    /// Delete the stored password and exam number, then exit
    #[arg(long)]
    pub delete_from_keyring: bool,

    /// Cookie jar path [default: <config dir>/assessment-uploader/cookies.json]
    #[arg(long, value_name = "PATH")]
    pub cookie_file: Option<PathBuf>,

    /// Don't load or save session cookies
    #[arg(long = "no-save-cookies", action = ArgAction::SetFalse)]
    pub save_cookies: bool,

    /// Delete the cookie file, then exit
    #[arg(long)]
    pub delete_cookies: bool,

    /// Portal config file [default: <config dir>/assessment-uploader/config.toml]
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Whether a maintenance flag replaces the upload run.
    #[must_use]
    pub fn is_cleanup_only(&self) -> bool {
        self.delete_cookies || self.delete_from_keyring
    }
}

impl fmt::Debug for Args {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Args")
            .field("submit_url", &self.submit_url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("exam_number", &self.exam_number.as_ref().map(|_| "[REDACTED]"))
            .field("file", &self.file)
            .field("dry_run", &self.dry_run)
            .field("use_keyring", &self.use_keyring)
            .field("delete_from_keyring", &self.delete_from_keyring)
            .field("cookie_file", &self.cookie_file)
            .field("save_cookies", &self.save_cookies)
            .field("delete_cookies", &self.delete_cookies)
            .field("config", &self.config)
            .field("verbose", &self.verbose)
            .field("quiet", &self.quiet)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SUBMIT: &str = "2021-2/submit/COM00012C/901/A";

    #[test]
    fn test_cli_minimal_args_use_defaults() {
        let args = Args::try_parse_from(["assessment-uploader", "-n", SUBMIT]).unwrap();
        assert_eq!(args.submit_url.as_deref(), Some(SUBMIT));
        assert_eq!(args.file, PathBuf::from("exam.zip"));
        assert!(args.use_keyring, "keyring is on by default");
        assert!(args.save_cookies, "cookies are saved by default");
        assert!(!args.dry_run);
        assert!(args.cookie_file.is_none());
        assert_eq!(args.verbose, 0);
        assert!(!args.quiet);
        assert!(!args.is_cleanup_only());
    }

    #[test]
    fn test_cli_submit_url_required_for_upload() {
        let result = Args::try_parse_from(["assessment-uploader"]);
        let err = result.unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_cli_delete_flags_do_not_need_submit_url() {
        let args = Args::try_parse_from(["assessment-uploader", "--delete-cookies"]).unwrap();
        assert!(args.delete_cookies);
        assert!(args.is_cleanup_only());

        let args =
            Args::try_parse_from(["assessment-uploader", "--delete-from-keyring", "-u", "ab1234"])
                .unwrap();
        assert!(args.delete_from_keyring);
        assert_eq!(args.username.as_deref(), Some("ab1234"));
    }

    #[test]
    fn test_cli_negative_toggles() {
        let args = Args::try_parse_from([
            "assessment-uploader",
            "-n",
            SUBMIT,
            "--no-use-keyring",
            "--no-save-cookies",
        ])
        .unwrap();
        assert!(!args.use_keyring);
        assert!(!args.save_cookies);
    }

    #[test]
    fn test_cli_credentials_and_paths() {
        let args = Args::try_parse_from([
            "assessment-uploader",
            "--submit-url",
            SUBMIT,
            "--username",
            "ab1234",
            "--password",
            "hunter2",
            "-e",
            "Y1234567",
            "-f",
            "answers.zip",
            "--cookie-file",
            "/tmp/jar.json",
            "--config",
            "/tmp/portal.toml",
            "--dry-run",
        ])
        .unwrap();
        assert_eq!(args.password.as_deref(), Some("hunter2"));
        assert_eq!(args.exam_number.as_deref(), Some("Y1234567"));
        assert_eq!(args.file, PathBuf::from("answers.zip"));
        assert_eq!(args.cookie_file, Some(PathBuf::from("/tmp/jar.json")));
        assert_eq!(args.config, Some(PathBuf::from("/tmp/portal.toml")));
        assert!(args.dry_run);
    }

    #[test]
    fn test_cli_verbose_flag_increments_count() {
        let args = Args::try_parse_from(["assessment-uploader", "-n", SUBMIT, "-vv"]).unwrap();
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn test_cli_debug_redacts_secrets() {
        let args = Args::try_parse_from([
            "assessment-uploader",
            "-n",
            SUBMIT,
            "--password",
            "hunter2",
            "-e",
            "Y7654321",
        ])
        .unwrap();
        let debug = format!("{args:?}");
        assert!(!debug.contains("hunter2"), "{debug}");
        assert!(!debug.contains("Y7654321"), "{debug}");
    }

    #[test]
    fn test_cli_help_flag_shows_usage() {
        let err = Args::try_parse_from(["assessment-uploader", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_cli_version_flag_shows_version() {
        let err = Args::try_parse_from(["assessment-uploader", "--version"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }

    #[test]
    fn test_cli_invalid_flag_returns_error() {
        let err = Args::try_parse_from(["assessment-uploader", "--invalid-flag"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::UnknownArgument);
    }
}

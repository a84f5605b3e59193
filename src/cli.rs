// Command-line surface. `Args` is what clap parses; `Action` is the one
// thing a run does, picked from those flags.

use clap::Parser;
use std::path::PathBuf;

/// Upload the clipboard image (or a file) to Backblaze B2 and copy the link.
#[derive(Parser, Debug)]
#[command(name = "uclip", author, version, about)]
pub struct Args {
    /// Configure credentials and upload settings interactively
    #[arg(long)]
    pub config: bool,

    /// Upload this file instead of the clipboard image
    #[arg(short, long, value_name = "PATH", conflicts_with = "delete")]
    pub file: Option<PathBuf>,

    /// Name to store the upload under (random when omitted)
    #[arg(short, long, conflicts_with = "delete")]
    pub name: Option<String>,

    /// Delete a previously uploaded file, by name or by its URL
    #[arg(short, long, value_name = "NAME")]
    pub delete: Option<String>,

    /// Print the URL without copying it to the clipboard
    #[arg(long)]
    pub no_copy: bool,

    /// Show debug logs and full error causes
    #[arg(short, long)]
    pub verbose: bool,

    /// Settings file to use instead of the default location
    #[arg(long, env = "UCLIP_CONFIG", value_name = "PATH")]
    pub config_path: Option<PathBuf>,

    /// Internal: hold TEXT on the clipboard until another program takes it
    #[arg(
        long,
        value_name = "TEXT",
        hide = true,
        conflicts_with_all = ["config", "file", "name", "delete"]
    )]
    pub serve_clipboard: Option<String>,
}

/// What a run should do, derived from the flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Configure,
    Upload {
        file: Option<PathBuf>,
        name: Option<String>,
    },
    Delete(String),
    ServeClipboard(String),
}

impl Args {
    pub fn action(&self) -> Action {
        if let Some(text) = &self.serve_clipboard {
            Action::ServeClipboard(text.clone())
        } else if self.config {
            Action::Configure
        } else if let Some(target) = &self.delete {
            Action::Delete(target.clone())
        } else {
            Action::Upload {
                file: self.file.clone(),
                name: self.name.clone(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_action_uploads_from_clipboard() {
        let args = Args::try_parse_from(["uclip"]).unwrap();
        assert_eq!(args.action(), Action::Upload { file: None, name: None });
        assert!(!args.verbose);
    }

    #[test]
    fn file_and_name_are_passed_through() {
        let args = Args::try_parse_from(["uclip", "-f", "shot.jpeg", "-n", "cat"]).unwrap();
        assert_eq!(
            args.action(),
            Action::Upload {
                file: Some(PathBuf::from("shot.jpeg")),
                name: Some("cat".into())
            }
        );
    }

    #[test]
    fn delete_and_config_select_their_actions() {
        let args = Args::try_parse_from(["uclip", "--delete", "abc.png"]).unwrap();
        assert_eq!(args.action(), Action::Delete("abc.png".into()));

        let args = Args::try_parse_from(["uclip", "--config"]).unwrap();
        assert_eq!(args.action(), Action::Configure);
    }

    #[test]
    fn delete_conflicts_with_upload_flags() {
        assert!(Args::try_parse_from(["uclip", "-d", "a.png", "-f", "b.png"]).is_err());
    }

    #[test]
    fn clipboard_helper_flag_is_hidden_and_standalone() {
        use clap::CommandFactory;

        let args = Args::try_parse_from(["uclip", "--serve-clipboard", "https://x/a.png"]).unwrap();
        assert_eq!(args.action(), Action::ServeClipboard("https://x/a.png".into()));

        let command = Args::command();
        let flag = command
            .get_arguments()
            .find(|arg| arg.get_id() == "serve_clipboard")
            .unwrap();
        assert!(flag.is_hide_set());
        assert!(Args::try_parse_from(["uclip", "--serve-clipboard", "x", "--config"]).is_err());
    }

    #[test]
    fn version_flag_is_available() {
        let err = Args::try_parse_from(["uclip", "--version"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }
}

use clap::{Parser, Subcommand};

/// nowplaying - a now-playing remote for your terminal 🎵
#[derive(Parser, Debug)]
#[command(name = "nowplaying", version, about)]
pub struct Args {
    /// Use the built-in offline player instead of Spotify
    #[arg(long, global = true)]
    pub offline: bool,

    /// More log output (repeatable), written to the log file
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Generate default config.toml to stdout
    #[arg(long)]
    pub generate_config: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Print the authorization link to open in a browser
    Authorize,
    /// Store the token from the redirect URL the browser landed on
    Callback {
        /// Full redirect URL, e.g. nowplaying://callback#access_token=...
        url: String,
    },
    /// Print what is playing right now
    Status,
    /// Resume playback
    Play,
    /// Pause playback
    Pause,
    /// Skip to the next track
    Next,
    /// Skip to the previous track
    Prev,
    /// Seek relative to the current position
    Seek {
        /// Seconds to move, negative to go back
        #[arg(allow_hyphen_values = true)]
        delta_secs: i64,
        /// Never seek past the end of the track
        #[arg(long)]
        clamp: bool,
    },
    /// Interactive remote (default)
    Remote,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negative_seek() {
        let args = Args::parse_from(["nowplaying", "seek", "-15"]);
        assert_eq!(
            args.command,
            Some(Command::Seek {
                delta_secs: -15,
                clamp: false
            })
        );
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = Args::parse_from(["nowplaying", "status", "--offline", "-vv"]);
        assert!(args.offline);
        assert_eq!(args.verbose, 2);
        assert_eq!(args.command, Some(Command::Status));
    }

    #[test]
    fn test_no_subcommand_means_remote() {
        let args = Args::parse_from(["nowplaying"]);
        assert!(args.command.is_none());
    }
}

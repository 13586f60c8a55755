//! Command-line commands for gator.
//!
//! Arguments are parsed into a [`Command`] up front, so a bad argument fails
//! before anything touches the database. [`run`] dispatches with a `match`;
//! commands that act on behalf of a user resolve the logged-in user first and
//! receive it as a parameter.

mod aggregate;
mod feeds;
mod users;

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::Config;
use crate::db::{Database, User, UserRepository};
use crate::feed::{parse_interval, DEFAULT_BROWSE_LIMIT};
use crate::{GatorError, Result};

/// Usage text shown for missing or malformed commands.
pub const USAGE: &str = "\
usage: gator <command> [args...]

commands:
  register <name>        create a user and log in as them
  login <name>           log in as an existing user
  users                  list users
  reset                  delete all users, feeds and posts
  agg <interval>         fetch feeds every interval (e.g. 30s, 5m, 1h)
  addfeed <name> <url>   add a feed and follow it
  feeds                  list all feeds
  follow <url>           follow an existing feed
  following              list followed feeds
  unfollow <url>         stop following a feed
  browse [limit]         show the newest posts from followed feeds";

/// A parsed command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Register { name: String },
    Login { name: String },
    Users,
    Reset,
    Agg { interval: Duration },
    AddFeed { name: String, url: String },
    Feeds,
    Follow { url: String },
    Following,
    Unfollow { url: String },
    Browse { limit: i64 },
}

impl Command {
    /// Parse the arguments after the program name.
    pub fn parse(args: &[String]) -> Result<Self> {
        let Some((name, rest)) = args.split_first() else {
            return Err(GatorError::Validation("no command given".to_string()));
        };

        let command = match name.as_str() {
            "register" => Command::Register {
                name: one_arg(name, rest, "<name>")?,
            },
            "login" => Command::Login {
                name: one_arg(name, rest, "<name>")?,
            },
            "users" => {
                no_args(name, rest)?;
                Command::Users
            }
            "reset" => {
                no_args(name, rest)?;
                Command::Reset
            }
            "agg" => Command::Agg {
                interval: parse_interval(&one_arg(name, rest, "<interval>")?)?,
            },
            "addfeed" => match rest {
                [feed_name, url] => Command::AddFeed {
                    name: feed_name.clone(),
                    url: url.clone(),
                },
                _ => return Err(usage_error(name, "<name> <url>")),
            },
            "feeds" => {
                no_args(name, rest)?;
                Command::Feeds
            }
            "follow" => Command::Follow {
                url: one_arg(name, rest, "<url>")?,
            },
            "following" => {
                no_args(name, rest)?;
                Command::Following
            }
            "unfollow" => Command::Unfollow {
                url: one_arg(name, rest, "<url>")?,
            },
            "browse" => match rest {
                [] => Command::Browse {
                    limit: DEFAULT_BROWSE_LIMIT,
                },
                [limit] => Command::Browse {
                    limit: parse_limit(limit)?,
                },
                _ => return Err(usage_error(name, "[limit]")),
            },
            other => {
                return Err(GatorError::Validation(format!("unknown command '{other}'")));
            }
        };

        Ok(command)
    }

    /// Whether the command acts on behalf of the logged-in user.
    pub fn requires_user(&self) -> bool {
        matches!(
            self,
            Command::AddFeed { .. }
                | Command::Follow { .. }
                | Command::Following
                | Command::Unfollow { .. }
                | Command::Browse { .. }
        )
    }
}

fn usage_error(command: &str, args: &str) -> GatorError {
    GatorError::Validation(format!("usage: gator {command} {args}"))
}

fn one_arg(command: &str, rest: &[String], args: &str) -> Result<String> {
    match rest {
        [arg] if !arg.trim().is_empty() => Ok(arg.clone()),
        _ => Err(usage_error(command, args)),
    }
}

fn no_args(command: &str, rest: &[String]) -> Result<()> {
    if rest.is_empty() {
        Ok(())
    } else {
        Err(GatorError::Validation(format!(
            "{command} takes no arguments"
        )))
    }
}

fn parse_limit(s: &str) -> Result<i64> {
    match s.parse::<i64>() {
        Ok(limit) if limit > 0 => Ok(limit),
        _ => Err(GatorError::Validation(format!(
            "invalid limit '{s}': expected a positive integer"
        ))),
    }
}

/// Everything a command needs to run.
pub struct AppState {
    /// Effective configuration (file plus environment overrides).
    pub config: Config,
    /// Where the configuration file lives.
    pub config_path: PathBuf,
    /// Open database.
    pub db: Database,
}

impl AppState {
    /// Create the state for one invocation.
    pub fn new(config: Config, config_path: impl Into<PathBuf>, db: Database) -> Self {
        Self {
            config,
            config_path: config_path.into(),
            db,
        }
    }

    /// Record `name` as the logged-in user in the config file.
    ///
    /// Only the session changes on disk; environment overrides applied to
    /// the effective configuration are not written back.
    fn persist_current_user(&mut self, name: &str) -> Result<()> {
        let mut on_disk = if self.config_path.exists() {
            Config::load(&self.config_path)?
        } else {
            Config::default()
        };
        on_disk.set_user(name);
        on_disk.save(&self.config_path)?;

        self.config.set_user(name);
        Ok(())
    }

    /// Resolve the logged-in user.
    async fn logged_in_user(&self) -> Result<User> {
        let name = self.config.current_user().ok_or_else(|| {
            GatorError::Validation("not logged in: run `gator login <name>` first".to_string())
        })?;

        UserRepository::new(self.db.pool())
            .get_by_name(name)
            .await?
            .ok_or_else(|| GatorError::NotFound(format!("user {name}")))
    }
}

/// Run a command, writing its output to `out`.
pub async fn run<W: Write>(state: &mut AppState, command: Command, out: &mut W) -> Result<()> {
    let user = if command.requires_user() {
        Some(state.logged_in_user().await?)
    } else {
        None
    };

    match (command, user) {
        (Command::Register { name }, _) => users::register(state, &name, out).await,
        (Command::Login { name }, _) => users::login(state, &name, out).await,
        (Command::Users, _) => users::list(state, out).await,
        (Command::Reset, _) => users::reset(state, out).await,
        (Command::Agg { interval }, _) => aggregate::run(state, interval, out).await,
        (Command::Feeds, _) => feeds::list(state, out).await,
        (Command::AddFeed { name, url }, Some(user)) => {
            feeds::add(state, &user, &name, &url, out).await
        }
        (Command::Follow { url }, Some(user)) => feeds::follow(state, &user, &url, out).await,
        (Command::Following, Some(user)) => feeds::following(state, &user, out).await,
        (Command::Unfollow { url }, Some(user)) => feeds::unfollow(state, &user, &url, out).await,
        (Command::Browse { limit }, Some(user)) => feeds::browse(state, &user, limit, out).await,
        (command, None) => Err(GatorError::Validation(format!(
            "{command:?} requires a logged-in user"
        ))),
    }
}

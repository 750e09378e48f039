//! Streak commands for CLI.

use clap::Subcommand;
use serde::Serialize;
use streak_core::error::ValidationError;
use streak_core::{
    Caller, Config, HistoryEntry, PositionUpdate, StreakDb, StreakDraft, StreakId,
    StreakPatch, StreakService, StreakView, SystemClock, TimezoneOffset,
};

#[derive(Subcommand)]
pub enum StreakAction {
    /// List streaks in display order
    List {
        /// Include archived runs of every streak
        #[arg(long)]
        history: bool,
    },
    /// Show one streak
    Show {
        /// Streak ID
        id: StreakId,
    },
    /// Show archived runs of a streak
    History {
        /// Streak ID
        id: StreakId,
    },
    /// Create a new streak
    Create {
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// Color as #rrggbb (default: streaks.default_color)
        #[arg(long)]
        color: Option<String>,
    },
    /// Update title, description or color
    Update {
        /// Streak ID
        id: StreakId,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        color: Option<String>,
    },
    /// Delete a streak permanently
    Delete {
        /// Streak ID
        id: StreakId,
    },
    /// Record today's activity
    Extend {
        /// Streak ID
        id: StreakId,
        /// Hours east of UTC (default: this machine's offset)
        #[arg(long, allow_hyphen_values = true)]
        tz_offset: Option<f64>,
    },
    /// Close the current run and start over
    End {
        /// Streak ID
        id: StreakId,
    },
    /// Set positions, e.g. `reorder 3=1 1=2`
    Reorder {
        #[arg(value_parser = parse_position, required = true)]
        positions: Vec<PositionUpdate>,
    },
    /// Print the current time on the stored client clock
    Now,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ListedStreak {
    #[serde(flatten)]
    view: StreakView,
    #[serde(skip_serializing_if = "Option::is_none")]
    history: Option<Vec<HistoryEntry>>,
}

fn parse_position(arg: &str) -> Result<PositionUpdate, ValidationError> {
    let invalid = |message: String| ValidationError::InvalidValue {
        field: "position".into(),
        message,
    };
    let (id, position) = arg
        .split_once('=')
        .ok_or_else(|| invalid(format!("expected <id>=<position>, got '{arg}'")))?;
    let id = id
        .parse::<StreakId>()
        .map_err(|e| invalid(format!("bad id '{id}': {e}")))?;
    let position = position
        .trim()
        .parse::<i64>()
        .map_err(|e| invalid(format!("bad position '{position}': {e}")))?;
    Ok(PositionUpdate { id, position })
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn run(
    action: StreakAction,
    owner: &str,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let service = StreakService::with_config(StreakDb::open()?, SystemClock, config);
    let caller = Caller::new(owner);

    match action {
        StreakAction::List { history } => {
            let views = service.get_streak_views(&caller)?;
            let mut listed = Vec::with_capacity(views.len());
            for view in views {
                let history = if history {
                    Some(service.get_history(&caller, view.streak.id)?)
                } else {
                    None
                };
                listed.push(ListedStreak { view, history });
            }
            print_json(&listed)?;
        }
        StreakAction::Show { id } => {
            print_json(&service.get_streak(&caller, id)?)?;
        }
        StreakAction::History { id } => {
            print_json(&service.get_history(&caller, id)?)?;
        }
        StreakAction::Create {
            title,
            description,
            color,
        } => {
            let streak = service.create(
                &caller,
                StreakDraft {
                    title,
                    description,
                    color,
                },
            )?;
            print_json(&streak)?;
        }
        StreakAction::Update {
            id,
            title,
            description,
            color,
        } => {
            let patch = StreakPatch {
                title,
                description,
                color,
            };
            if patch.is_empty() {
                return Err("nothing to update: pass --title, --description or --color".into());
            }
            print_json(&service.update(&caller, id, patch)?)?;
        }
        StreakAction::Delete { id } => {
            print_json(&service.delete(&caller, id)?)?;
        }
        StreakAction::Extend { id, tz_offset } => {
            let offset = match tz_offset {
                Some(hours) => TimezoneOffset::from_hours(hours)?,
                None => TimezoneOffset::local(),
            };
            print_json(&service.extend(&caller, id, offset)?)?;
        }
        StreakAction::End { id } => {
            print_json(&service.end(&caller, id)?)?;
        }
        StreakAction::Reorder { positions } => {
            service.reorder(&caller, &positions)?;
            println!("ok");
        }
        StreakAction::Now => {
            print_json(&service.client_time(&caller)?)?;
        }
    }
    Ok(())
}

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;

use tracelog_sessions::{Explorer, Navigation, NodeLog, PathLookup, TraceError};

use crate::output;

#[derive(Subcommand, Debug)]
pub enum QueryCommand {
    /// List root sessions and their run sizes
    Roots {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Group the active run's sessions by outcome
    Outcomes {
        #[arg(long)]
        json: bool,
    },

    /// Show goal markers of the active run
    Results {
        #[arg(long)]
        json: bool,
    },

    /// Show the active run as a tree
    Tree {
        #[arg(long)]
        json: bool,
    },

    /// Resolve the root-to-node path of a session
    Path {
        /// Session id, e.g. 1(1:2)
        id: String,

        #[arg(long)]
        json: bool,
    },

    /// Show a node's log from its root (`#<id>` or `#<id>#raw`)
    Log {
        address: String,

        /// Show raw records instead of merged operations
        #[arg(long)]
        raw: bool,

        #[arg(long)]
        json: bool,
    },

    /// Print every session, ordered by (root, parent, mach)
    Dump {
        /// Only the summary line per session
        #[arg(long, conflicts_with = "json")]
        terse: bool,

        /// Re-serialize the sessions as a JSON array
        #[arg(long)]
        json: bool,
    },
}

fn print_lines(lines: &[String]) {
    for line in lines {
        println!("{}", line);
    }
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn require_run(explorer: &Explorer) -> Result<()> {
    if explorer.active().is_none() {
        return Err(TraceError::NoActiveRun.into());
    }
    Ok(())
}

pub fn handle_query_command(explorer: &mut Explorer, command: QueryCommand) -> Result<()> {
    match command {
        QueryCommand::Roots { json } => {
            let roots = explorer.roots();
            if json {
                print_json(&roots)?;
            } else if roots.is_empty() {
                println!("{}", "No root sessions found.".dimmed());
            } else {
                print_lines(&output::roots_lines(&roots));
            }
        }
        QueryCommand::Outcomes { json } => {
            require_run(explorer)?;
            let buckets = explorer.outcome_buckets();
            if json {
                print_json(&buckets)?;
            } else {
                print_lines(&output::outcome_lines(&buckets));
            }
        }
        QueryCommand::Results { json } => {
            let results = explorer.results().ok_or(TraceError::NoActiveRun)?;
            if json {
                print_json(&results.iter().collect::<Vec<_>>())?;
            } else if results.is_empty() {
                println!("{}", "No goals in this run.".dimmed());
            } else {
                print_lines(&output::result_lines(results));
            }
        }
        QueryCommand::Tree { json } => {
            require_run(explorer)?;
            if json {
                print_json(explorer.tree())?;
            } else {
                print_lines(&output::tree_lines(explorer.tree()));
            }
        }
        QueryCommand::Path { id, json } => {
            let lookup = explorer.resolve_path(&id)?;
            if json {
                print_json(&lookup)?;
            } else {
                match lookup {
                    PathLookup::Path(nodes) => {
                        for n in nodes {
                            println!("{}{}", "  ".repeat(n.depth), n.id);
                        }
                    }
                    PathLookup::Empty => {
                        println!("{}", format!("{} is not in the active run.", id).dimmed());
                    }
                }
            }
        }
        QueryCommand::Log { address, raw, json } => {
            let mut address = address;
            if raw && !address.ends_with("#raw") {
                address.push_str("#raw");
            }
            let mut nav = explorer.navigate(&address);
            if let Navigation::Cleared { address, reason } = &nav {
                eprintln!("{} {}", "Cleared:".bright_yellow(), reason);
                if address.is_empty() {
                    anyhow::bail!("Nothing to show for {:?}", reason);
                }
                let fallback = address.clone();
                nav = explorer.navigate(&fallback);
            }
            if json {
                print_json(&nav)?;
            } else if let Navigation::Log { address, log, .. } = &nav {
                println!("{}", address.bright_blue().bold());
                match log {
                    NodeLog::Raw(raw) => print_lines(&output::raw_lines(raw)),
                    NodeLog::Normalized(norm) => print_lines(&output::normalized_lines(norm)),
                }
            }
        }
        QueryCommand::Dump { terse, json } => {
            let index = explorer.index();
            let order = output::dump_order(index);
            if json {
                let sessions: Vec<_> = order.iter().filter_map(|id| index.session(id)).collect();
                print_json(&sessions)?;
            } else {
                for id in &order {
                    if terse {
                        println!("{}", output::dump_line(index, id)?);
                    } else {
                        print_lines(&output::dump_full(index, id)?);
                    }
                }
            }
        }
    }

    Ok(())
}

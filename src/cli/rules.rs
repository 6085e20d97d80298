//! `rules` subcommand: manage a user's automation rules from the shell.

use crate::automation::AutomationEngine;
use crate::db::Database;
use crate::types::RuleInput;
use anyhow::{Result, bail};
use clap::{Args, Subcommand};
use std::io::Write;
use std::sync::Arc;

/// Rule subcommands
#[derive(Subcommand, Debug)]
pub enum RulesCommand {
    /// List a user's rules in evaluation order
    List(ListArgs),

    /// Add a rule
    Add(AddArgs),

    /// Remove a rule
    Remove(RemoveArgs),

    /// Run a user's rules against some text and print the generated links
    Eval(EvalArgs),
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Owner of the rules
    #[arg(short, long)]
    pub user: String,
}

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Owner of the rule
    #[arg(short, long)]
    pub user: String,

    /// Human-readable label
    #[arg(short, long)]
    pub name: String,

    /// Pattern matched against task text
    #[arg(short, long)]
    pub regex: String,

    /// Link built from the match; `$0` is the whole match, `$1..` capture groups
    #[arg(short, long)]
    pub template: String,
}

#[derive(Args, Debug)]
pub struct RemoveArgs {
    /// Owner of the rule
    #[arg(short, long)]
    pub user: String,

    /// Rule ID
    #[arg(long)]
    pub id: String,
}

#[derive(Args, Debug)]
pub struct EvalArgs {
    /// Owner of the rules
    #[arg(short, long)]
    pub user: String,

    /// Task text to evaluate
    #[arg(long)]
    pub content: String,
}

/// Execute a rules subcommand, writing results to `out`.
pub async fn run_rules<W: Write>(
    db: Arc<Database>,
    engine: &AutomationEngine,
    command: RulesCommand,
    out: &mut W,
) -> Result<()> {
    match command {
        RulesCommand::List(args) => {
            for rule in db.list_rules(&args.user)? {
                writeln!(
                    out,
                    "{}\t{}\t{}\t{}",
                    rule.id, rule.name, rule.regex, rule.link_template
                )?;
            }
        }
        RulesCommand::Add(args) => {
            if args.name.trim().is_empty() || args.regex.is_empty() || args.template.trim().is_empty() {
                bail!("name, regex and template must not be empty");
            }
            let input = RuleInput {
                name: args.name,
                regex: args.regex,
                link_template: args.template,
            };
            let rule = db.create_rule(&args.user, &input)?;
            engine.clear_user_cache(&args.user);
            writeln!(out, "{}", rule.id)?;
        }
        RulesCommand::Remove(args) => {
            if !db.delete_rule(&args.user, &args.id)? {
                bail!("Automation rule not found: {}", args.id);
            }
            engine.clear_user_cache(&args.user);
        }
        RulesCommand::Eval(args) => {
            for link in engine.execute(&args.content, &args.user, &[]).await? {
                writeln!(out, "{}", link)?;
            }
        }
    }
    Ok(())
}

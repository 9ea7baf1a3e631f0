use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use uuid::Uuid;

use crate::application::{SpendingOverTimeReport, SplitService};
use crate::domain::{format_amount, format_cents, parse_cents};
use crate::io::Exporter;

/// Divvy - shared-expense ledger
#[derive(Parser)]
#[command(name = "divvy")]
#[command(about = "A local-first shared-expense ledger that tells you who owes whom")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, default_value = "divvy.db")]
    pub database: String,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Group management commands
    #[command(subcommand)]
    Group(GroupCommands),

    /// Expense management commands
    #[command(subcommand)]
    Expense(ExpenseCommands),

    /// Record a payment between two members
    Pay {
        /// Amount paid (e.g., "50.00" or "50")
        amount: String,

        /// Group name
        #[arg(short, long)]
        group: String,

        /// Paying member
        #[arg(long)]
        from: String,

        /// Receiving member
        #[arg(long)]
        to: String,

        /// Free-form note
        #[arg(short, long)]
        note: Option<String>,

        /// Confirmed external payment reference (gateway order id)
        #[arg(long = "ref")]
        external_ref: Option<String>,
    },

    /// Payment records
    #[command(subcommand)]
    Payments(PaymentCommands),

    /// Spending reports
    #[command(subcommand)]
    Report(ReportCommands),

    /// Show current balances for a group
    Balance {
        /// Group name
        group: String,
    },

    /// Show the settlement plan: who pays whom to zero everyone out
    Settle {
        /// Group name
        group: String,
    },

    /// Verify ledger integrity
    Check,

    /// Export data to CSV or JSON
    Export {
        /// What to export: balances, expenses, settlement, full
        export_type: String,

        /// Group name (required for everything except "full")
        #[arg(short, long)]
        group: Option<String>,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum GroupCommands {
    /// Create a new group
    Create {
        /// Group name (must be unique)
        name: String,

        /// Member identifiers (repeat for each member)
        #[arg(short, long = "member", required = true)]
        members: Vec<String>,

        /// Currency code: EUR, USD, INR
        #[arg(short, long, default_value = "EUR")]
        currency: String,

        /// Description
        #[arg(short, long)]
        description: Option<String>,
    },

    /// List all groups
    List,

    /// Show group details
    Show {
        /// Group name
        name: String,
    },

    /// Rename a group
    Rename {
        /// Current group name
        name: String,

        /// New group name
        new_name: String,
    },

    /// Add a member to a group
    AddMember {
        /// Group name
        name: String,

        /// Member identifier
        member: String,
    },

    /// Remove a member (only allowed once their balance is zero)
    RemoveMember {
        /// Group name
        name: String,

        /// Member identifier
        member: String,
    },

    /// Delete a group and everything recorded in it
    Delete {
        /// Group name
        name: String,
    },
}

#[derive(Subcommand)]
pub enum PaymentCommands {
    /// List payments recorded in a group
    List {
        /// Group name
        group: String,
    },

    /// Show detailed payment information
    Show {
        /// Payment ID
        id: String,
    },
}

#[derive(Subcommand)]
pub enum ReportCommands {
    /// Spending per category
    Categories {
        /// Group name
        group: String,

        /// Output format: table, json, csv
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Spending per calendar month
    Monthly {
        /// Group name
        group: String,

        /// Output format: table, json, csv
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Spending per calendar day
    Daily {
        /// Group name
        group: String,

        /// Output format: table, json, csv
        #[arg(long, default_value = "table")]
        format: String,
    },
}

#[derive(Subcommand)]
pub enum ExpenseCommands {
    /// Record a shared expense
    Add {
        /// Short label for the expense (e.g., "dinner")
        name: String,

        /// Group name
        #[arg(short, long)]
        group: String,

        /// Member who paid
        #[arg(short, long)]
        owner: String,

        /// Total amount paid (e.g., "90.00")
        #[arg(short, long)]
        amount: String,

        /// Members sharing the expense (repeat for each)
        #[arg(short, long = "participant", required = true)]
        participants: Vec<String>,

        /// Spending category ("food", "travel")
        #[arg(short, long)]
        category: Option<String>,

        /// Date of the expense (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<String>,
    },

    /// List a group's expenses
    List {
        /// Group name
        group: String,
    },

    /// Show detailed expense information
    Show {
        /// Expense ID
        id: String,
    },

    /// Edit an expense (replaces label, owner, amount, and participants)
    Edit {
        /// Expense ID
        id: String,

        /// New label
        #[arg(short, long)]
        name: String,

        /// New owner
        #[arg(short, long)]
        owner: String,

        /// New total amount
        #[arg(short, long)]
        amount: String,

        /// New participant set (repeat for each)
        #[arg(short, long = "participant", required = true)]
        participants: Vec<String>,

        /// New spending category (omit to clear)
        #[arg(short, long)]
        category: Option<String>,

        /// New expense date (YYYY-MM-DD, defaults to the original date)
        #[arg(long)]
        date: Option<String>,
    },

    /// Delete an expense, reversing its split
    Delete {
        /// Expense ID
        id: String,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Commands::Init => {
                SplitService::init(&self.database).await?;
                println!("Database initialized: {}", self.database);
            }

            Commands::Group(group_cmd) => {
                let service = SplitService::connect(&self.database).await?;
                run_group_command(&service, group_cmd).await?;
            }

            Commands::Expense(expense_cmd) => {
                let service = SplitService::connect(&self.database).await?;
                run_expense_command(&service, expense_cmd).await?;
            }

            Commands::Pay {
                amount,
                group,
                from,
                to,
                note,
                external_ref,
            } => {
                let service = SplitService::connect(&self.database).await?;
                let amount_cents =
                    parse_cents(&amount).context("Invalid amount format. Use '50.00' or '50'")?;

                let payment = service
                    .record_payment(&group, &from, &to, amount_cents, note, external_ref)
                    .await?;

                let currency = service.get_group(&group).await?.currency;
                println!(
                    "Recorded payment: {} {} -> {} ({})",
                    format_amount(payment.event.amount_cents(), &currency),
                    payment.event.payer(),
                    payment.event.payee(),
                    payment.id
                );
            }

            Commands::Payments(payment_cmd) => {
                let service = SplitService::connect(&self.database).await?;
                run_payment_command(&service, payment_cmd).await?;
            }

            Commands::Report(report_cmd) => {
                let service = SplitService::connect(&self.database).await?;
                run_report_command(&service, report_cmd).await?;
            }

            Commands::Balance { group } => {
                let service = SplitService::connect(&self.database).await?;
                let currency = service.get_group(&group).await?.currency;
                let entries = service.balances(&group).await?;

                if entries.is_empty() {
                    println!("Everyone in '{}' is settled up.", group);
                } else {
                    println!("{:<24} {:>14}", "MEMBER", "BALANCE");
                    println!("{}", "-".repeat(40));
                    for entry in entries {
                        println!(
                            "{:<24} {:>14}",
                            entry.member.to_string(),
                            format_amount(entry.amount_cents, &currency)
                        );
                    }
                }
            }

            Commands::Settle { group } => {
                let service = SplitService::connect(&self.database).await?;
                let currency = service.get_group(&group).await?.currency;
                let plan = service.settlement_plan(&group).await?;

                if plan.is_empty() {
                    println!("Everyone in '{}' is settled up.", group);
                } else {
                    println!("Settlement plan for '{}':", group);
                    for step in plan {
                        println!(
                            "  {} pays {} to {}",
                            step.from,
                            format_amount(step.amount_cents, &currency),
                            step.to
                        );
                    }
                }
            }

            Commands::Check => {
                let service = SplitService::connect(&self.database).await?;
                let report = service.check_integrity().await?;

                println!("Groups:    {}", report.stats.group_count);
                println!("Expenses:  {}", report.stats.expense_count);
                println!("Payments:  {}", report.stats.payment_count);
                println!();

                if report.is_clean() {
                    println!("Integrity check passed.");
                } else {
                    for (name, residual) in &report.unbalanced_groups {
                        println!(
                            "FAIL: group '{}' is off balance by {} cents",
                            name, residual
                        );
                    }
                    if report.stats.orphaned_expenses > 0 {
                        println!(
                            "FAIL: {} expense(s) reference a missing group",
                            report.stats.orphaned_expenses
                        );
                    }
                    if report.stats.orphaned_payments > 0 {
                        println!(
                            "FAIL: {} payment(s) reference a missing group",
                            report.stats.orphaned_payments
                        );
                    }
                    if report.stats.non_positive_amounts > 0 {
                        println!(
                            "FAIL: {} record(s) with a non-positive amount",
                            report.stats.non_positive_amounts
                        );
                    }
                    anyhow::bail!("integrity check failed");
                }
            }

            Commands::Export {
                export_type,
                group,
                output,
            } => {
                let service = SplitService::connect(&self.database).await?;
                run_export_command(&service, &export_type, group.as_deref(), output.as_deref())
                    .await?;
            }
        }

        Ok(())
    }
}

async fn run_group_command(service: &SplitService, cmd: GroupCommands) -> Result<()> {
    match cmd {
        GroupCommands::Create {
            name,
            members,
            currency,
            description,
        } => {
            let group = service
                .create_group(name, currency, members, description)
                .await?;
            println!(
                "Created group: {} ({}, {} member(s))",
                group.name,
                group.currency,
                group.members.len()
            );
        }

        GroupCommands::List => {
            let groups = service.list_groups().await?;
            if groups.is_empty() {
                println!("No groups found.");
            } else {
                println!("{:<24} {:<8} {:>8}", "NAME", "CURRENCY", "MEMBERS");
                println!("{}", "-".repeat(44));
                for group in groups {
                    println!(
                        "{:<24} {:<8} {:>8}",
                        group.name,
                        group.currency,
                        group.members.len()
                    );
                }
            }
        }

        GroupCommands::Show { name } => {
            let group = service.get_group(&name).await?;
            let total = service.group_total(&name).await?;

            println!("Group: {}", group.name);
            println!("  ID:        {}", group.id);
            println!("  Currency:  {}", group.currency);
            if let Some(desc) = &group.description {
                println!("  About:     {}", desc);
            }
            println!(
                "  Created:   {}",
                group.created_at.format("%Y-%m-%d %H:%M:%S")
            );
            println!("  Spent:     {}", format_amount(total, &group.currency));
            println!("  Members:");
            for member in &group.members {
                println!("    {}", member);
            }
        }

        GroupCommands::Rename { name, new_name } => {
            let group = service.rename_group(&name, &new_name).await?;
            println!("Renamed group '{}' to '{}'", name, group.name);
        }

        GroupCommands::AddMember { name, member } => {
            let group = service.add_member(&name, &member).await?;
            println!(
                "Added {} to '{}' ({} member(s))",
                member,
                group.name,
                group.members.len()
            );
        }

        GroupCommands::RemoveMember { name, member } => {
            let group = service.remove_member(&name, &member).await?;
            println!(
                "Removed {} from '{}' ({} member(s))",
                member,
                group.name,
                group.members.len()
            );
        }

        GroupCommands::Delete { name } => {
            service.delete_group(&name).await?;
            println!("Deleted group: {}", name);
        }
    }

    Ok(())
}

async fn run_expense_command(service: &SplitService, cmd: ExpenseCommands) -> Result<()> {
    match cmd {
        ExpenseCommands::Add {
            name,
            group,
            owner,
            amount,
            participants,
            category,
            date,
        } => {
            let amount_cents =
                parse_cents(&amount).context("Invalid amount format. Use '50.00' or '50'")?;
            let spent_at = parse_date_or_now(date.as_deref())?;

            let expense = service
                .add_expense(
                    &group,
                    name,
                    &owner,
                    amount_cents,
                    participants,
                    spent_at,
                    category,
                )
                .await?;

            let currency = service.get_group(&group).await?.currency;
            println!(
                "Recorded expense '{}': {} paid by {} ({})",
                expense.name,
                format_amount(expense.share.total_cents(), &currency),
                expense.share.owner(),
                expense.id
            );
        }

        ExpenseCommands::List { group } => {
            let currency = service.get_group(&group).await?.currency;
            let expenses = service.list_expenses(&group).await?;

            if expenses.is_empty() {
                println!("No expenses recorded in '{}'.", group);
            } else {
                println!(
                    "{:<38} {:<18} {:<18} {:>12}  {}",
                    "ID", "NAME", "OWNER", "AMOUNT", "DATE"
                );
                println!("{}", "-".repeat(100));
                for expense in expenses {
                    println!(
                        "{:<38} {:<18} {:<18} {:>12}  {}",
                        expense.id.to_string(),
                        expense.name,
                        expense.share.owner().to_string(),
                        format_amount(expense.share.total_cents(), &currency),
                        expense.spent_at.format("%Y-%m-%d")
                    );
                }
            }
        }

        ExpenseCommands::Show { id } => {
            let expense_id =
                Uuid::parse_str(&id).context("Invalid expense ID format (expected UUID)")?;
            let expense = service.get_expense(expense_id).await?;

            println!("Expense: {}", expense.name);
            println!("  ID:           {}", expense.id);
            if let Some(category) = &expense.category {
                println!("  Category:     {}", category);
            }
            println!("  Owner:        {}", expense.share.owner());
            println!("  Amount:       {}", format_cents(expense.share.total_cents()));
            println!(
                "  Per head:     {}",
                format_cents(expense.share.share_cents())
            );
            println!("  Date:         {}", expense.spent_at.format("%Y-%m-%d"));
            println!("  Participants:");
            for member in expense.share.participants() {
                println!("    {}", member);
            }
        }

        ExpenseCommands::Edit {
            id,
            name,
            owner,
            amount,
            participants,
            category,
            date,
        } => {
            let expense_id =
                Uuid::parse_str(&id).context("Invalid expense ID format (expected UUID)")?;
            let amount_cents =
                parse_cents(&amount).context("Invalid amount format. Use '50.00' or '50'")?;
            let spent_at = match date {
                Some(d) => parse_date(&d)?,
                None => service.get_expense(expense_id).await?.spent_at,
            };

            let expense = service
                .edit_expense(
                    expense_id,
                    name,
                    &owner,
                    amount_cents,
                    participants,
                    spent_at,
                    category,
                )
                .await?;
            println!(
                "Updated expense '{}': {} paid by {}",
                expense.name,
                format_cents(expense.share.total_cents()),
                expense.share.owner()
            );
        }

        ExpenseCommands::Delete { id } => {
            let expense_id =
                Uuid::parse_str(&id).context("Invalid expense ID format (expected UUID)")?;
            let expense = service.delete_expense(expense_id).await?;
            println!(
                "Deleted expense '{}' ({}); its split has been reversed",
                expense.name,
                format_cents(expense.share.total_cents())
            );
        }
    }

    Ok(())
}

async fn run_payment_command(service: &SplitService, cmd: PaymentCommands) -> Result<()> {
    match cmd {
        PaymentCommands::List { group } => {
            let currency = service.get_group(&group).await?.currency;
            let payments = service.list_payments(&group).await?;

            if payments.is_empty() {
                println!("No payments recorded in '{}'.", group);
            } else {
                println!(
                    "{:<38} {:<22} {:<22} {:>12}  {}",
                    "ID", "FROM", "TO", "AMOUNT", "DATE"
                );
                println!("{}", "-".repeat(108));
                for payment in payments {
                    println!(
                        "{:<38} {:<22} {:<22} {:>12}  {}",
                        payment.id.to_string(),
                        payment.event.payer().to_string(),
                        payment.event.payee().to_string(),
                        format_amount(payment.event.amount_cents(), &currency),
                        payment.paid_at.format("%Y-%m-%d")
                    );
                }
            }
        }

        PaymentCommands::Show { id } => {
            let payment_id =
                Uuid::parse_str(&id).context("Invalid payment ID format (expected UUID)")?;
            let payment = service.get_payment(payment_id).await?;

            println!("Payment: {}", payment.id);
            println!("  From:     {}", payment.event.payer());
            println!("  To:       {}", payment.event.payee());
            println!("  Amount:   {}", format_cents(payment.event.amount_cents()));
            println!("  Date:     {}", payment.paid_at.format("%Y-%m-%d %H:%M:%S"));
            if let Some(note) = &payment.note {
                println!("  Note:     {}", note);
            }
            if let Some(external_ref) = &payment.external_ref {
                println!("  Ref:      {}", external_ref);
            }
        }
    }

    Ok(())
}

async fn run_report_command(service: &SplitService, cmd: ReportCommands) -> Result<()> {
    match cmd {
        ReportCommands::Categories { group, format } => {
            let currency = service.get_group(&group).await?.currency;
            let report = service.category_report(&group).await?;

            match format.as_str() {
                "json" => {
                    println!("{}", serde_json::to_string_pretty(&report)?);
                }
                "csv" => {
                    println!("category,total_cents,count,average_cents,percentage");
                    for cat in &report.categories {
                        println!(
                            "{},{},{},{},{:.2}",
                            cat.category, cat.total, cat.count, cat.average, cat.percentage
                        );
                    }
                }
                _ => {
                    println!("Spending by category for '{}'", report.group);
                    println!();
                    println!(
                        "{:<20} {:>14} {:>6} {:>14} {:>8}",
                        "CATEGORY", "TOTAL", "COUNT", "AVERAGE", "PERCENT"
                    );
                    println!("{}", "-".repeat(66));
                    for cat in &report.categories {
                        println!(
                            "{:<20} {:>14} {:>6} {:>14} {:>7.1}%",
                            truncate(&cat.category, 20),
                            format_amount(cat.total, &currency),
                            cat.count,
                            format_cents(cat.average),
                            cat.percentage
                        );
                    }
                    println!("{}", "-".repeat(66));
                    println!(
                        "{:<20} {:>14}",
                        "TOTAL",
                        format_amount(report.total, &currency)
                    );
                }
            }
        }

        ReportCommands::Monthly { group, format } => {
            let currency = service.get_group(&group).await?.currency;
            let report = service.monthly_report(&group).await?;
            print_period_report(&report, &currency, &format, "MONTH")?;
        }

        ReportCommands::Daily { group, format } => {
            let currency = service.get_group(&group).await?.currency;
            let report = service.daily_report(&group).await?;
            print_period_report(&report, &currency, &format, "DAY")?;
        }
    }

    Ok(())
}

fn print_period_report(
    report: &SpendingOverTimeReport,
    currency: &str,
    format: &str,
    period_label: &str,
) -> Result<()> {
    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(report)?);
        }
        "csv" => {
            println!("period,total_cents,count");
            for period in &report.periods {
                println!("{},{},{}", period.period, period.total, period.count);
            }
        }
        _ => {
            println!("Spending over time for '{}'", report.group);
            println!();
            println!("{:<12} {:>14} {:>6}", period_label, "TOTAL", "COUNT");
            println!("{}", "-".repeat(36));
            for period in &report.periods {
                println!(
                    "{:<12} {:>14} {:>6}",
                    period.period,
                    format_amount(period.total, currency),
                    period.count
                );
            }
            println!("{}", "-".repeat(36));
            println!(
                "{:<12} {:>14}",
                "TOTAL",
                format_amount(report.total, currency)
            );
        }
    }

    Ok(())
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}

async fn run_export_command(
    service: &SplitService,
    export_type: &str,
    group: Option<&str>,
    output: Option<&str>,
) -> Result<()> {
    let exporter = Exporter::new(service);

    let require_group = || {
        group.context("This export needs a group: pass --group <NAME>")
    };

    let mut buffer: Vec<u8> = Vec::new();
    let count = match export_type {
        "balances" => exporter.export_balances_csv(require_group()?, &mut buffer).await?,
        "expenses" => exporter.export_expenses_csv(require_group()?, &mut buffer).await?,
        "settlement" => {
            exporter
                .export_settlement_csv(require_group()?, &mut buffer)
                .await?
        }
        "full" => {
            let snapshot = exporter.export_full_json(&mut buffer).await?;
            snapshot.groups.len()
        }
        other => anyhow::bail!(
            "Unknown export type '{}'. Valid types: balances, expenses, settlement, full",
            other
        ),
    };

    match output {
        Some(path) => {
            std::fs::write(path, &buffer)
                .with_context(|| format!("Failed to write {}", path))?;
            println!("Exported {} record(s) to {}", count, path);
        }
        None => {
            use std::io::Write;
            std::io::stdout().write_all(&buffer)?;
        }
    }

    Ok(())
}

fn parse_date(date_str: &str) -> Result<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .with_context(|| format!("Invalid date format '{}'. Use YYYY-MM-DD", date_str))?;
    Ok(date
        .and_hms_opt(0, 0, 0)
        .context("Invalid time")?
        .and_utc())
}

fn parse_date_or_now(date_str: Option<&str>) -> Result<DateTime<Utc>> {
    match date_str {
        Some(s) => parse_date(s),
        None => Ok(Utc::now()),
    }
}

//! List command - Show the fault catalog
//!
//! Actions are printed in catalog order with the 1-based index the
//! interactive prompt accepts.

use anyhow::Result;
use clap::ValueEnum;

use crashlab_core::domain::FaultGroup;
use crashlab_faults::catalog;

use crate::app::AppContext;
use crate::output::{get_formatter, Table};

/// Group filter accepted on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum GroupArg {
    Crash,
    Error,
}

impl From<GroupArg> for FaultGroup {
    fn from(arg: GroupArg) -> Self {
        match arg {
            GroupArg::Crash => FaultGroup::Crash,
            GroupArg::Error => FaultGroup::Error,
        }
    }
}

/// Arguments for the list subcommand
#[derive(Debug, clap::Args)]
pub struct ListCommand {
    /// Only show actions of this group
    #[arg(long, value_enum)]
    pub group: Option<GroupArg>,
}

impl ListCommand {
    pub async fn execute(&self, app: &AppContext) -> Result<()> {
        let formatter = get_formatter(app.format);
        let group = self.group.map(FaultGroup::from);

        let rows: Vec<(usize, &catalog::FaultAction)> = catalog::actions()
            .iter()
            .enumerate()
            .map(|(i, action)| (i + 1, action))
            .filter(|(_, action)| group.map_or(true, |g| action.group == g))
            .collect();

        if app.format.is_json() {
            let json: Vec<serde_json::Value> = rows
                .iter()
                .map(|(index, action)| {
                    serde_json::json!({
                        "index": index,
                        "key": action.key,
                        "label": action.label,
                        "group": action.group,
                        "takes_seconds": action.takes_seconds,
                    })
                })
                .collect();
            formatter.print_json(&serde_json::json!(json));
            return Ok(());
        }

        let mut table = Table::new(&[("#", 3), ("KEY", 30), ("GROUP", 6), ("LABEL", 0)]);
        for (index, action) in &rows {
            table.row(vec![
                index.to_string(),
                action.key.to_string(),
                action.group.to_string(),
                action.label.to_string(),
            ]);
        }
        table.print("action");
        Ok(())
    }
}

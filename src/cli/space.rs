//
//  octopus-client
//  cli/space.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! Space commands

use anyhow::Result;
use clap::{Args, Subcommand};
use console::style;
use serde::Serialize;

use crate::api::resources::SpaceResource;
use crate::api::SpaceResolver;
use crate::output::{format_bool, truncate, OutputWriter, TableOutput};

use super::GlobalOptions;

/// Inspect spaces
#[derive(Args, Debug)]
pub struct SpaceCommand {
    #[command(subcommand)]
    pub command: SpaceSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum SpaceSubcommand {
    /// List spaces
    #[command(visible_alias = "ls")]
    List(ListArgs),
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Only show spaces whose name contains this text
    #[arg(long, short = 'f')]
    pub filter: Option<String>,
}

#[derive(Debug, Serialize)]
struct SpaceListItem {
    id: String,
    name: String,
    description: Option<String>,
    is_default: bool,
    task_queue_stopped: bool,
}

impl From<SpaceResource> for SpaceListItem {
    fn from(space: SpaceResource) -> Self {
        Self {
            id: space.id,
            name: space.name,
            description: space.description,
            is_default: space.is_default,
            task_queue_stopped: space.task_queue_stopped,
        }
    }
}

impl TableOutput for SpaceListItem {
    fn print_table(&self, color: bool) {
        let name = if color {
            style(&self.name).bold().to_string()
        } else {
            self.name.clone()
        };
        let description = truncate(self.description.as_deref().unwrap_or("-"), 40);

        println!(
            "{:<12} {:<25} {:<8} {:<8} {}",
            self.id,
            name,
            format_bool(self.is_default, color),
            format_bool(self.task_queue_stopped, color),
            description
        );
    }
}

impl SpaceCommand {
    pub async fn run(&self, global: &GlobalOptions) -> Result<()> {
        match &self.command {
            SpaceSubcommand::List(args) => self.list(args, global).await,
        }
    }

    async fn list(&self, args: &ListArgs, global: &GlobalOptions) -> Result<()> {
        let client = global.client()?;
        let spaces = SpaceResolver::new(client).list_spaces().await?;

        let items: Vec<SpaceListItem> = spaces
            .into_iter()
            .filter(|space| matches_filter(&space.name, args.filter.as_deref()))
            .map(SpaceListItem::from)
            .collect();

        let writer = OutputWriter::new(global.format());

        if items.is_empty() && !global.json {
            println!("No spaces found.");
            return Ok(());
        }

        if !global.json {
            println!();
            println!(
                "{} {} {} {} {}",
                style(format!("{:<12}", "ID")).bold(),
                style(format!("{:<25}", "NAME")).bold(),
                style(format!("{:<8}", "DEFAULT")).bold(),
                style(format!("{:<8}", "STOPPED")).bold(),
                style("DESCRIPTION").bold()
            );
            println!("{}", "-".repeat(80));
        }

        writer.write_list(&items)?;

        if !global.json {
            println!();
            println!("Showing {} space(s)", items.len());
        }

        Ok(())
    }
}

fn matches_filter(name: &str, filter: Option<&str>) -> bool {
    match filter {
        Some(filter) => name.to_lowercase().contains(&filter.to_lowercase()),
        None => true,
    }
}

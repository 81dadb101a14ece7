//! `configure` and its subcommands. These read the config file tier only;
//! `configure debug` shows the full resolution.

use std::collections::BTreeMap;

use anyhow::bail;
use doppler_core::config::ConfigOption;
use doppler_core::config::EffectiveConfig;
use doppler_core::config::Flag;
use doppler_core::config::FlagOverrides;
use doppler_core::config::Source;
use doppler_core::config::token_preview;
use serde_json::json;

use crate::cli::ConfigureArgs;
use crate::cli::ConfigureCommand;
use crate::cli::FlagsCommand;
use crate::context::CommandContext;

pub(crate) fn run(ctx: &mut CommandContext, args: ConfigureArgs) -> anyhow::Result<()> {
    match args.command {
        None if args.all => show_all(ctx),
        None => show_scope(ctx),
        Some(ConfigureCommand::Get { options, plain }) => get(ctx, &options, plain),
        Some(ConfigureCommand::Set { values }) => {
            let values = parse_assignments(&values)?;
            ctx.store.set(&ctx.scope, &values)?;
            ctx.refresh();
            ctx.printer.success("Configuration has been updated");
            Ok(())
        }
        Some(ConfigureCommand::Unset { options }) => {
            let options = options
                .iter()
                .map(|name| name.parse::<ConfigOption>())
                .collect::<Result<Vec<_>, _>>()?;
            ctx.store.unset(&ctx.scope, &options)?;
            ctx.refresh();
            ctx.printer.success("Configuration has been updated");
            Ok(())
        }
        Some(ConfigureCommand::Options) => options(ctx),
        Some(ConfigureCommand::Debug) => debug(ctx),
        Some(ConfigureCommand::Flags { command }) => flags(ctx, command),
    }
}

/// `name=value ...`, or exactly `name value`.
fn parse_assignments(values: &[String]) -> anyhow::Result<Vec<(ConfigOption, String)>> {
    if let [name, value] = values
        && !name.contains('=')
    {
        return Ok(vec![(name.parse()?, value.clone())]);
    }
    values
        .iter()
        .map(|pair| {
            let Some((name, value)) = pair.split_once('=') else {
                bail!("expected NAME=VALUE, got {pair:?}");
            };
            Ok((name.parse::<ConfigOption>()?, value.to_string()))
        })
        .collect()
}

fn file_tier(ctx: &CommandContext) -> EffectiveConfig {
    ctx.store
        .resolve(&ctx.scope, &FlagOverrides::default(), false)
}

/// Value shown by the overview commands, in tables and JSON alike. Only
/// `configure get` prints a token in full.
fn display_value(option: ConfigOption, value: &str) -> String {
    if option.is_sensitive() {
        token_preview(value)
    } else {
        value.to_string()
    }
}

fn show_scope(ctx: &CommandContext) -> anyhow::Result<()> {
    let resolved = file_tier(ctx);
    let configured: Vec<(ConfigOption, &str, &str)> = ConfigOption::ALL
        .into_iter()
        .map(|option| (option, resolved.get(option)))
        .filter(|(_, value)| value.source == Source::ConfigFile)
        .map(|(option, value)| (option, value.value.as_str(), value.scope.as_str()))
        .collect();

    let as_json: BTreeMap<&str, String> = configured
        .iter()
        .map(|(option, value, _)| (option.as_str(), display_value(*option, value)))
        .collect();
    let rows = configured
        .iter()
        .map(|(option, value, scope)| {
            vec![
                option.to_string(),
                display_value(*option, value),
                scope.to_string(),
            ]
        })
        .collect();
    ctx.printer.print(&as_json, &["name", "value", "scope"], rows)
}

fn show_all(ctx: &CommandContext) -> anyhow::Result<()> {
    let mut as_json: BTreeMap<&str, BTreeMap<&str, String>> = BTreeMap::new();
    let mut rows = Vec::new();
    for (scope, options) in &ctx.store.file().scoped {
        for (option, stored) in options.iter() {
            let value = if option == ConfigOption::Token {
                ctx.store.token_value(stored)
            } else {
                stored.to_string()
            };
            let value = display_value(option, &value);
            as_json
                .entry(scope.as_str())
                .or_default()
                .insert(option.as_str(), value.clone());
            rows.push(vec![scope.clone(), option.to_string(), value]);
        }
    }
    ctx.printer.print(&as_json, &["scope", "name", "value"], rows)
}

fn get(ctx: &CommandContext, names: &[String], plain: bool) -> anyhow::Result<()> {
    let options = names
        .iter()
        .map(|name| name.parse::<ConfigOption>())
        .collect::<Result<Vec<_>, _>>()?;
    let resolved = file_tier(ctx);

    if plain {
        for option in options {
            ctx.printer.plain(&resolved.get(option).value);
        }
        return Ok(());
    }
    let as_json: BTreeMap<&str, &str> = options
        .iter()
        .map(|option| (option.as_str(), resolved.get(*option).value.as_str()))
        .collect();
    let rows = options
        .iter()
        .map(|option| {
            let value = resolved.get(*option);
            vec![
                option.to_string(),
                display_value(*option, &value.value),
                value.scope.clone(),
            ]
        })
        .collect();
    ctx.printer.print(&as_json, &["name", "value", "scope"], rows)
}

fn options(ctx: &CommandContext) -> anyhow::Result<()> {
    let as_json: Vec<_> = ConfigOption::ALL
        .iter()
        .map(|option| json!({ "name": option.as_str(), "env": option.env_var() }))
        .collect();
    let rows = ConfigOption::ALL
        .iter()
        .map(|option| vec![option.to_string(), option.env_var().to_string()])
        .collect();
    ctx.printer.print(&as_json, &["name", "env"], rows)
}

fn debug(ctx: &CommandContext) -> anyhow::Result<()> {
    let resolved = &ctx.config;
    let version_check = ctx.store.version_check();
    if ctx.printer.is_json() {
        let options: BTreeMap<&str, _> = ConfigOption::ALL
            .iter()
            .map(|option| {
                let value = resolved.get(*option);
                (
                    option.as_str(),
                    json!({
                        "value": display_value(*option, &value.value),
                        "scope": value.scope,
                        "source": value.source.as_str(),
                    }),
                )
            })
            .collect();
        return ctx.printer.json(&json!({
            "configuration": ctx.store.path(),
            "scope": ctx.scope,
            "options": options,
            "version-check": version_check,
        }));
    }

    ctx.printer
        .plain(&format!("Configuration file: {}", ctx.store.path().display()));
    ctx.printer.plain(&format!("Scope: {}", ctx.scope));
    if let Some(checked_at) = version_check.checked_at {
        ctx.printer.plain(&format!(
            "Last version check: {} (latest {})",
            checked_at.to_rfc3339(),
            version_check.latest_version
        ));
    }
    let rows = ConfigOption::ALL
        .iter()
        .map(|option| {
            let value = resolved.get(*option);
            vec![
                option.to_string(),
                display_value(*option, &value.value),
                value.scope.clone(),
                value.source.to_string(),
            ]
        })
        .collect::<Vec<_>>();
    ctx.printer.table(&["name", "value", "scope", "source"], &rows);
    Ok(())
}

fn flags(ctx: &mut CommandContext, command: Option<FlagsCommand>) -> anyhow::Result<()> {
    match command {
        None => {
            let as_json: BTreeMap<&str, bool> = Flag::ALL
                .iter()
                .map(|flag| (flag.as_str(), ctx.store.flag(*flag)))
                .collect();
            let rows = Flag::ALL
                .iter()
                .map(|flag| {
                    vec![
                        flag.to_string(),
                        ctx.store.flag(*flag).to_string(),
                        flag.default_value().to_string(),
                    ]
                })
                .collect();
            ctx.printer.print(&as_json, &["flag", "value", "default"], rows)
        }
        Some(FlagsCommand::Get { flag }) => {
            let flag: Flag = flag.parse()?;
            let value = ctx.store.flag(flag);
            if ctx.printer.is_json() {
                ctx.printer.json(&json!({ (flag.as_str()): value }))
            } else {
                ctx.printer.plain(&value.to_string());
                Ok(())
            }
        }
        Some(FlagsCommand::Enable { flag }) => {
            let flag: Flag = flag.parse()?;
            ctx.store.set_flag(flag, true)?;
            ctx.printer.success(&format!("Enabled {flag}"));
            Ok(())
        }
        Some(FlagsCommand::Disable { flag }) => {
            let flag: Flag = flag.parse()?;
            ctx.store.set_flag(flag, false)?;
            ctx.printer.success(&format!("Disabled {flag}"));
            Ok(())
        }
        Some(FlagsCommand::Reset { flag }) => {
            let flag: Flag = flag.parse()?;
            ctx.store.reset_flag(flag)?;
            ctx.printer.success(&format!("Reset {flag} to its default"));
            Ok(())
        }
    }
}

use anyhow::Result;
use clap_complete::{Shell, generate};
use terraform_plugin::cli::{self, Commands, LogLevel};
use terraform_plugin::config;
use terraform_plugin::environment::Environment;

fn load_from_args(args: &[&str], env: &[(&str, &str)]) -> Result<config::Plugin> {
    let invocation = cli::parse_from(args.iter().copied())?;
    let (plugin, _) = config::load(
        &invocation.overrides,
        Environment::from_pairs(env.iter().copied()),
    )?;
    Ok(plugin)
}

#[test]
fn test_parse_no_arguments() -> Result<()> {
    let invocation = cli::parse_from(["terraform-plugin"])?;

    assert!(invocation.cli.command.is_none());
    assert_eq!(invocation.cli.log_level, LogLevel::Info);
    assert!(!invocation.cli.dry_run);

    Ok(())
}

#[test]
fn test_no_overrides_leaves_environment_in_charge() -> Result<()> {
    let plugin = load_from_args(
        &["terraform-plugin"],
        &[("PLUGIN_ACTIONS", "fmt"), ("PLUGIN_PARALLELISM", "3")],
    )?;

    assert_eq!(plugin.config.actions, vec!["fmt"]);
    assert_eq!(plugin.config.parallelism, 3);
    assert!(!plugin.config.skip_init);

    Ok(())
}

#[test]
fn test_flags_override_environment() -> Result<()> {
    let plugin = load_from_args(
        &[
            "terraform-plugin",
            "--actions",
            "plan,apply",
            "--skip_init",
            "--parallelism",
            "4",
            "--netrc.machine",
            "gitlab.com",
            "--targets",
            "module.a",
            "--targets",
            "module.b",
        ],
        &[("PLUGIN_ACTIONS", "fmt"), ("PLUGIN_PARALLELISM", "3")],
    )?;

    assert_eq!(plugin.config.actions, vec!["plan", "apply"]);
    assert!(plugin.config.skip_init);
    assert_eq!(plugin.config.parallelism, 4);
    assert_eq!(plugin.netrc.machine, "gitlab.com");
    assert_eq!(plugin.config.targets, vec!["module.a", "module.b"]);

    Ok(())
}

#[test]
fn test_list_flags_drop_empty_items_like_environment_values() -> Result<()> {
    let from_flag = load_from_args(&["terraform-plugin", "--actions", "plan, ,"], &[])?;
    let from_env = load_from_args(&["terraform-plugin"], &[("PLUGIN_ACTIONS", "plan, ,")])?;

    assert_eq!(from_flag.config.actions, vec!["plan"]);
    assert_eq!(from_flag.config.actions, from_env.config.actions);

    let targets = load_from_args(&["terraform-plugin", "--targets", "module.a,"], &[])?;
    assert_eq!(targets.config.targets, vec!["module.a"]);

    Ok(())
}

#[test]
fn test_json_flags_are_decoded_like_environment_values() -> Result<()> {
    let plugin = load_from_args(
        &["terraform-plugin", "--vars", r#"{"region":"eu-west-1"}"#],
        &[],
    )?;
    let vars = plugin.config.vars.expect("vars set");
    assert_eq!(vars.get("region").map(String::as_str), Some("eu-west-1"));

    let err = load_from_args(&["terraform-plugin", "--secrets", "nope"], &[]).unwrap_err();
    assert!(format!("{:#}", err).contains("secrets"));

    Ok(())
}

#[test]
fn test_invalid_parallelism_is_a_usage_error() {
    let err = cli::parse_from(["terraform-plugin", "--parallelism", "lots"]).unwrap_err();
    assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
}

#[test]
fn test_unknown_flag_is_rejected() {
    assert!(cli::parse_from(["terraform-plugin", "--no-such-flag"]).is_err());
}

#[test]
fn test_log_level_and_dry_run() -> Result<()> {
    let invocation = cli::parse_from(["terraform-plugin", "--log-level", "debug", "--dry-run"])?;
    assert_eq!(invocation.cli.log_level, LogLevel::Debug);
    assert!(invocation.cli.dry_run);
    Ok(())
}

#[test]
fn test_completions_subcommand_parses() -> Result<()> {
    let invocation = cli::parse_from(["terraform-plugin", "completions", "zsh"])?;
    match invocation.cli.command {
        Some(Commands::Completions(args)) => assert_eq!(args.shell, Shell::Zsh),
        other => panic!("unexpected command: {:?}", other),
    }
    Ok(())
}

#[test]
fn test_bash_completions_include_plugin_options() {
    let mut command = cli::command();
    let mut buf = Vec::new();
    generate(Shell::Bash, &mut command, "terraform-plugin", &mut buf);
    let script = String::from_utf8(buf).unwrap();

    assert!(script.contains("terraform-plugin"));
    assert!(script.contains("--actions"));
    assert!(script.contains("--skip_init"));
    assert!(script.contains("completions"));
}

#[test]
fn test_completions_generate_for_every_shell() {
    for shell in [
        Shell::Bash,
        Shell::Zsh,
        Shell::Fish,
        Shell::PowerShell,
        Shell::Elvish,
    ] {
        let mut command = cli::command();
        let mut buf = Vec::new();
        generate(shell, &mut command, "terraform-plugin", &mut buf);
        assert!(!buf.is_empty(), "empty completions for {:?}", shell);
    }
}

#[test]
fn test_command_definition_is_consistent() {
    cli::command().debug_assert();
}

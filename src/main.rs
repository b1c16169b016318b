use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use serde_json::Value;

use fleet_dashboard::api::endpoint::CardKind;
use fleet_dashboard::api::orchestrator_dto::manifest_dto::SequenceStepDto;
use fleet_dashboard::api::orchestrator_dto::module_dto::{FunctionDescriptionDto, MountDescriptionDto, MountStage};
use fleet_dashboard::config::DashboardConfig;
use fleet_dashboard::domain::client::api_trait::OrchestratorApi;
use fleet_dashboard::domain::client::orchestrator_client::OrchestratorClient;
use fleet_dashboard::domain::client::supervisor_client::SupervisorClient;
use fleet_dashboard::domain::execution::aggregator::StepResults;
use fleet_dashboard::domain::execution::params::parse_params;
use fleet_dashboard::domain::graph::render::render_graph;
use fleet_dashboard::domain::manifest::manifest_view::ManifestView;
use fleet_dashboard::domain::utils::id::{DeviceId, ManifestId, ModuleId};
use fleet_dashboard::error::Error;
use fleet_dashboard::loader::parser::parse_json_file;
use fleet_dashboard::{LiveSession as Session, logger, open_session};

/// Command-line dashboard for a WebAssembly device orchestrator.
#[derive(Parser)]
#[command(name = "fleetdash", version, about = "Inspect and drive a WebAssembly device fleet")]
struct Cli {
    /// JSON configuration file.
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Orchestrator base URL, overrides the configuration.
    #[arg(short, long, global = true)]
    orchestrator: Option<String>,

    /// Log debug output.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// List devices known to the orchestrator.
    Devices,
    /// List uploaded modules.
    Modules,
    /// List manifests.
    Manifests,
    /// List deployment certificates.
    Certificates,
    /// Deploy a manifest.
    Deploy { manifest: String },
    /// Execute a manifest and print the final and per-step results.
    Execute {
        manifest: String,
        /// Execution parameter as name=value. May be repeated.
        #[arg(short, long = "param", value_parser = parse_key_value)]
        params: Vec<(String, String)>,
    },
    /// Print the latest result of every step of a manifest.
    Results {
        manifest: String,
        /// Print the full history record of every step.
        #[arg(long)]
        details: bool,
        /// Download the declared output files of every step into this directory.
        #[arg(long)]
        save_outputs: Option<PathBuf>,
    },
    /// Print the device graph once.
    Graph {
        #[arg(short, long)]
        manifest: Option<String>,
    },
    /// Keep polling devices and print the graph whenever it changes. Stop with Ctrl-C.
    Watch {
        #[arg(short, long)]
        manifest: Option<String>,
    },
    /// Upload a module binary.
    UploadModule { name: String, file: PathBuf },
    DeleteModule { id: String },
    DeleteManifest { id: String },
    /// Create a manifest from steps written as device:module:func.
    CreateManifest {
        name: String,
        #[arg(required = true, value_parser = parse_step)]
        steps: Vec<SequenceStepDto>,
    },
    /// Describe the exported functions of an uploaded module. Every export gets integer
    /// parameters and output; mounts are given as func:mount:stage=path.
    DescribeModule {
        id: String,
        #[arg(short, long = "mount", value_parser = parse_mount)]
        mounts: Vec<MountArg>,
    },
    /// Print a metadata card collection, or replace it with the content of a JSON file.
    Cards {
        kind: String,
        #[arg(long)]
        set: Option<String>,
    },
    /// Ask the orchestrator to rediscover devices.
    ResetDiscovery,
    /// Delete every entry of a collection.
    DeleteAll { what: Collection },
}

#[derive(Clone, Copy, ValueEnum)]
enum Collection {
    Devices,
    Modules,
    Manifests,
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => Ok((name.trim().to_string(), value.to_string())),
        _ => Err(format!("expected name=value, got '{}'", raw)),
    }
}

fn parse_step(raw: &str) -> Result<SequenceStepDto, String> {
    let parts: Vec<&str> = raw.split(':').collect();
    match parts.as_slice() {
        [device, module, func] if !device.is_empty() && !module.is_empty() && !func.is_empty() => {
            Ok(SequenceStepDto { device: DeviceId::new(*device), module: ModuleId::new(*module), func: func.to_string() })
        }
        _ => Err(format!("expected device:module:func, got '{}'", raw)),
    }
}

#[derive(Clone)]
struct MountArg {
    function: String,
    name: String,
    stage: MountStage,
    path: PathBuf,
}

fn parse_mount(raw: &str) -> Result<MountArg, String> {
    let (target, path) = raw.split_once('=').ok_or_else(|| format!("expected func:mount:stage=path, got '{}'", raw))?;
    let parts: Vec<&str> = target.split(':').collect();
    match parts.as_slice() {
        [function, name, stage] if !function.is_empty() && !name.is_empty() => {
            let stage = stage.parse::<MountStage>().map_err(|e| e.to_string())?;
            Ok(MountArg { function: function.to_string(), name: name.to_string(), stage, path: PathBuf::from(path) })
        }
        _ => Err(format!("expected func:mount:stage=path, got '{}'", raw)),
    }
}

fn print_json(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(_) => println!("{}", value),
    }
}

fn print_step_results(session: &Session, results: Option<&StepResults>) {
    let Some(results) = results else {
        println!("{}", "No step results (the selection changed while fetching).".yellow());
        return;
    };
    let steps = session.graph_snapshot().overlay().to_vec();
    for (index, entry) in results.steps.0.iter().enumerate() {
        let step_name = steps.get(index).map(|s| format!("{}.{}", s.module_name, s.function_name)).unwrap_or_default();
        match entry {
            Some(step) => println!("  {} {:<28} {}", format!("[{}]", index).bold(), step_name, step.result.to_string().green()),
            None => println!("  {} {:<28} {}", format!("[{}]", index).bold(), step_name, "no result".dimmed()),
        }
    }
}

async fn select(session: &Session, manifest: &str) -> anyhow::Result<()> {
    session.refresh_manifests().await.context("fetching manifests")?;
    session.select_manifest(Some(&ManifestId::new(manifest)))?;
    Ok(())
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = DashboardConfig::load(cli.config.as_deref())?;
    if let Some(url) = cli.orchestrator {
        config = config.with_orchestrator_url(url);
        config.validate()?;
    }

    let orchestrator = Arc::new(OrchestratorClient::new(&config)?);
    let supervisor = Arc::new(SupervisorClient::new(&config)?);

    match cli.cmd {
        Cmd::Devices => {
            for device in orchestrator.devices().await? {
                let health = device.health.as_ref().map(|h| format!("cpu {:.2}", h.report.cpu_usage)).unwrap_or_else(|| "-".to_string());
                println!("{:<26} {:<20} {:<22} {}", device.id.to_string().dimmed(), device.name.bold(), format!("{}:{}", device.address().unwrap_or("?"), device.communication.port), health);
            }
        }
        Cmd::Modules => {
            for module in orchestrator.modules().await? {
                let exports: Vec<String> = module.exports.iter().map(|e| format!("{}/{}", e.name, e.parameter_count)).collect();
                println!("{:<26} {:<20} {}", module.id.to_string().dimmed(), module.name.bold(), exports.join(", "));
            }
        }
        Cmd::Manifests => {
            for manifest in orchestrator.manifests().await? {
                let view = ManifestView::new(&manifest);
                let steps: Vec<String> = view.resolved_steps().iter().map(|s| format!("{}.{}@{}", s.module_name, s.function_name, s.device_id)).collect();
                println!("{:<26} {:<20} {}", manifest.id.to_string().dimmed(), manifest.name.bold(), steps.join(" -> "));
            }
        }
        Cmd::Certificates => {
            for certificate in orchestrator.deployment_certificates().await? {
                let verdict = if certificate.valid { "valid".green() } else { "invalid".red() };
                println!("{:<26} {} ({} log entries)", certificate.deployment_id.to_string(), verdict, certificate.validation_logs.len());
            }
        }
        Cmd::Deploy { manifest } => {
            let session = Session::detached(orchestrator, supervisor, &config);
            let id = ManifestId::new(manifest);
            print_json(&session.deploy(&id).await?);
            match session.certificate(&id) {
                Some(certificate) if certificate.valid => println!("{}", "Deployment certificate is valid.".green()),
                Some(_) => println!("{}", "Deployment certificate is invalid.".red()),
                None => println!("{}", "No deployment certificate yet.".yellow()),
            }
        }
        Cmd::Execute { manifest, params } => {
            let session = Session::detached(orchestrator, supervisor, &config);
            select(&session, &manifest).await?;

            let declared = session.with_state(|state| state.selected_manifest().map(|m| ManifestView::new(m).execution_parameters()).unwrap_or_default());
            let params = parse_params(&declared, &params)?;

            let outcome = session.execute(&params).await?;
            println!("{} {}", "Result:".bold(), outcome.result.to_string().green());
            print_step_results(&session, outcome.steps.as_ref());
        }
        Cmd::Results { manifest, details, save_outputs } => {
            let session = Session::detached(orchestrator, supervisor.clone(), &config);
            select(&session, &manifest).await?;
            let results = session.aggregate_selected().await;
            print_step_results(&session, results.as_ref());

            let Some(results) = results else {
                return Ok(());
            };
            let steps = session.graph_snapshot().overlay().to_vec();
            for (step, entry) in steps.iter().zip(results.steps.0.iter()) {
                let Some(entry) = entry else {
                    continue;
                };
                if details {
                    match supervisor.request_history_entry(&entry.url, &entry.request_id).await {
                        Ok(record) => {
                            println!("{}", format!("Step {} record:", step.index).bold());
                            print_json(&serde_json::to_value(&record)?);
                        }
                        Err(e) => log::warn!("Could not read record '{}' of step {}: {}", entry.request_id, step.index, e),
                    }
                }
                if let Some(dir) = &save_outputs {
                    std::fs::create_dir_all(dir)?;
                    for mount in &step.output_mounts {
                        let Some(file_name) = mount.local_file_name(step.index) else {
                            log::warn!("Skipping output '{}' of step {}: no usable file name.", mount.path, step.index);
                            continue;
                        };
                        let bytes = match supervisor.module_result(&entry.url, &step.module_name, &mount.path).await {
                            Ok(bytes) => bytes,
                            Err(e) => {
                                log::warn!("Could not download output '{}' of step {}: {}", mount.path, step.index, e);
                                continue;
                            }
                        };
                        let target = dir.join(file_name);
                        if let Err(e) = std::fs::write(&target, &bytes) {
                            log::warn!("Could not write {}: {}", target.display(), e);
                            continue;
                        }
                        println!("Saved {} ({}, {} bytes)", target.display(), mount.media_type, bytes.len());
                    }
                }
            }
        }
        Cmd::Graph { manifest } => {
            let session = Session::detached(orchestrator, supervisor, &config);
            session.refresh_devices().await?;
            if let Some(manifest) = manifest {
                select(&session, &manifest).await?;
            }
            print!("{}", render_graph(&session.graph_snapshot(), None));
        }
        Cmd::Watch { manifest } => {
            let session = open_session(&config)?;
            if let Some(manifest) = manifest {
                select(&session, &manifest).await?;
            }

            let mut revisions = session.subscribe();
            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => break,
                    changed = revisions.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        println!("{}", chrono::Local::now().format("%H:%M:%S").to_string().dimmed());
                        print!("{}", render_graph(&session.graph_snapshot(), session.step_results().as_ref()));
                    }
                }
            }
            session.unmount().await;
        }
        Cmd::UploadModule { name, file } => {
            let bytes = std::fs::read(&file).with_context(|| format!("reading '{}'", file.display()))?;
            let filename = file.file_name().map(|f| f.to_string_lossy().to_string()).unwrap_or_else(|| name.clone());
            print_json(&orchestrator.create_module(&name, &filename, bytes).await?);
        }
        Cmd::DeleteModule { id } => print_json(&orchestrator.delete_module(&ModuleId::new(id)).await?),
        Cmd::DeleteManifest { id } => print_json(&orchestrator.delete_manifest(&ManifestId::new(id)).await?),
        Cmd::CreateManifest { name, steps } => print_json(&orchestrator.create_manifest(&name, steps).await?),
        Cmd::DescribeModule { id, mounts } => {
            let module_id = ModuleId::new(id);
            let Some(module) = orchestrator.module(&module_id).await? else {
                anyhow::bail!("module '{}' not found", module_id);
            };

            let mut descriptions: Vec<FunctionDescriptionDto> = module.exports.iter().map(FunctionDescriptionDto::from_export).collect();
            let mut files = Vec::with_capacity(mounts.len());
            for mount in mounts {
                let Some(description) = descriptions.iter_mut().find(|d| d.name == mount.function) else {
                    anyhow::bail!("module '{}' does not export '{}'", module.name, mount.function);
                };
                description.mounts.push(MountDescriptionDto { name: mount.name.clone(), stage: mount.stage });
                let bytes = std::fs::read(&mount.path).with_context(|| format!("reading '{}'", mount.path.display()))?;
                files.push((mount.name, bytes));
            }
            print_json(&orchestrator.describe_module(&module_id, &descriptions, files).await?);
        }
        Cmd::Cards { kind, set } => {
            let kind = kind.parse::<CardKind>()?;
            match set {
                Some(path) => {
                    let body: Value = parse_json_file(&path)?;
                    print_json(&orchestrator.post_cards(kind, &body).await?);
                }
                None => print_json(&orchestrator.cards(kind).await?),
            }
        }
        Cmd::ResetDiscovery => print_json(&orchestrator.reset_device_discovery().await?),
        Cmd::DeleteAll { what } => {
            let response = match what {
                Collection::Devices => orchestrator.delete_devices().await?,
                Collection::Modules => orchestrator.delete_all_modules().await?,
                Collection::Manifests => orchestrator.delete_all_manifests().await?,
            };
            print_json(&response);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logger::init_with_level(cli.verbose.then_some(log::LevelFilter::Debug));

    if let Err(e) = run(cli).await {
        log::error!("{:#}", e);
        let message = match e.downcast_ref::<Error>() {
            Some(error) => error.user_message(),
            None => format!("{:#}", e),
        };
        eprintln!("{} {}", "error:".red().bold(), message);
        std::process::exit(1);
    }
}

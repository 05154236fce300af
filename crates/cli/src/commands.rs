//! CLI command implementations

use anyhow::{bail, Context, Result};
use colored::*;
use probeforge_core::{CandidateSource, Report, RunConfig, RunSettings, TerminationReason};
use probeforge_probes::{
    analyze, constants, expand_hosts, generate, parse_ports, DiscoveryMethod, HashAlgorithm,
    HashProbe, HostDiscoveryProbe, HttpProbe, TcpConnectProbe, UrlMode,
};
use std::time::Duration;
use tracing::info;

use crate::{
    output::{self, SuccessStyle},
    scanner::{self, RunOptions},
    utils, Cli, Commands, Discovery, EngineArgs, HashType,
};

/// Per-command defaults, used when neither the command line nor a config
/// file sets a value
#[derive(Debug, Clone, Copy)]
pub struct CommandDefaults {
    pub threads: usize,
    pub timeout: Duration,
    pub delay: Option<Duration>,
    pub early_exit: bool,
}

const HTTP_DEFAULTS: CommandDefaults = CommandDefaults {
    threads: 10,
    timeout: constants::DEFAULT_HTTP_TIMEOUT,
    delay: None,
    early_exit: false,
};

const PORT_DEFAULTS: CommandDefaults = CommandDefaults {
    threads: 100,
    timeout: constants::DEFAULT_TCP_TIMEOUT,
    delay: None,
    early_exit: false,
};

#[cfg_attr(not(feature = "ssh"), allow(dead_code))]
const SSH_DEFAULTS: CommandDefaults = CommandDefaults {
    threads: 5,
    timeout: constants::DEFAULT_SSH_TIMEOUT,
    delay: Some(constants::DEFAULT_SSH_DELAY),
    early_exit: true,
};

const CRACK_DEFAULTS: CommandDefaults = CommandDefaults {
    threads: 4,
    timeout: Duration::from_secs(1),
    delay: None,
    early_exit: true,
};

/// Dispatch the parsed command
pub async fn execute(cli: &Cli, file_config: Option<&RunSettings>) -> Result<()> {
    match &cli.command {
        Commands::Dirs {
            url,
            wordlist,
            extensions,
            engine,
        } => {
            let config = build_run_config(engine, file_config, HTTP_DEFAULTS)?;
            let mode = UrlMode::join(url).with_context(|| format!("Invalid URL {url}"))?;
            let probe = HttpProbe::new(mode.clone(), config.probe_timeout)?;

            let mut builder = CandidateSource::builder()
                .words(probeforge_core::load_wordlist(wordlist)?);
            let extensions = extensions.as_deref().map(utils::parse_list).unwrap_or_default();
            if !extensions.is_empty() {
                builder = builder.extensions(extensions.iter().cloned());
            }
            let source = builder.build()?;

            if let UrlMode::Join(base) = &mode {
                let mut fields = vec![
                    ("Directory enumeration for", base.to_string()),
                    ("Using wordlist", wordlist.display().to_string()),
                    ("Threads", config.concurrency.to_string()),
                ];
                if !extensions.is_empty() {
                    fields.push(("Checking extensions", extensions.join(",")));
                }
                output::print_banner(cli, &fields);
            }

            let report = scanner::execute(
                RunOptions::new(cli, engine, SuccessStyle::Found),
                config,
                source,
                probe,
            )
            .await?;
            output::finish(cli, engine, &report, "Enumeration completed!")
        }

        Commands::Subdomains {
            domain,
            wordlist,
            https,
            engine,
        } => {
            let config = build_run_config(engine, file_config, HTTP_DEFAULTS)?;
            let scheme = if *https { "https" } else { "http" };
            let probe = HttpProbe::new(UrlMode::host(scheme)?, config.probe_timeout)?;

            let source = CandidateSource::builder()
                .words(probeforge_core::load_wordlist(wordlist)?)
                .domain(domain.as_str())
                .build()?;
            let domain = source.domain().unwrap_or(domain).to_string();

            output::print_banner(
                cli,
                &[
                    ("Subdomain discovery for", domain),
                    ("Using wordlist", wordlist.display().to_string()),
                    ("Threads", config.concurrency.to_string()),
                ],
            );
            if let Some(path) = &config.output {
                output::print_banner(cli, &[("Saving results to", path.display().to_string())]);
            }

            let report = scanner::execute(
                RunOptions::new(cli, engine, SuccessStyle::Found),
                config,
                source,
                probe,
            )
            .await?;
            output::finish(cli, engine, &report, "Discovery completed!")
        }

        Commands::Ports {
            targets,
            ports,
            discovery,
            engine,
        } => {
            if targets.is_empty() {
                bail!("No targets specified");
            }
            let config = build_run_config(engine, file_config, PORT_DEFAULTS)?;

            let mut hosts = Vec::new();
            for target in targets {
                hosts.extend(
                    expand_hosts(target).with_context(|| format!("Invalid target {target}"))?,
                );
            }
            let ports = match ports {
                Some(spec) => parse_ports(spec).with_context(|| format!("Invalid ports {spec}"))?,
                None => constants::COMMON_TCP_PORTS.to_vec(),
            };

            output::print_banner(
                cli,
                &[
                    ("Network scan of", targets.join(", ")),
                    ("Hosts", hosts.len().to_string()),
                    ("Ports", utils::format_ports(&ports)),
                    ("Threads", config.concurrency.to_string()),
                ],
            );

            let wait = config.probe_timeout.unwrap_or(PORT_DEFAULTS.timeout);
            let method = match discovery {
                Discovery::Ping => Some(DiscoveryMethod::Ping),
                Discovery::Tcp => Some(DiscoveryMethod::TcpConnect),
                Discovery::None => None,
            };
            if let Some(method) = method {
                let discovered = discover_hosts(cli, engine, &config, hosts, method, wait).await?;
                if discovered.termination == TerminationReason::Cancelled {
                    return output::finish(cli, engine, &discovered, "Scan interrupted");
                }
                hosts = live_hosts(&discovered);
                if hosts.is_empty() {
                    println!("{}", "\n[!] No live hosts found".yellow());
                    return output::finish(cli, engine, &discovered, "Scanning complete!");
                }
            }

            let probe = TcpConnectProbe::new(wait);
            let source = CandidateSource::builder().words(hosts).ports(ports).build()?;
            let report = scanner::execute(
                RunOptions::new(cli, engine, SuccessStyle::Open),
                config,
                source,
                probe,
            )
            .await?;
            output::finish(cli, engine, &report, "Scanning complete!")
        }

        Commands::Ssh {
            target,
            port,
            user,
            wordlist,
            engine,
        } => execute_ssh(cli, file_config, target, *port, user, wordlist, engine).await,

        Commands::Crack {
            hash,
            hash_type,
            wordlist,
            engine,
        } => {
            let config = build_run_config(engine, file_config, CRACK_DEFAULTS)?;
            let algorithm = hash_algorithm(*hash_type);
            let probe = HashProbe::new(algorithm, hash)?;
            let source = CandidateSource::from_words(probeforge_core::load_wordlist(wordlist)?)?;

            output::print_banner(
                cli,
                &[
                    ("Starting hash cracker", String::new()),
                    ("Hash type", algorithm.as_str().to_uppercase()),
                    ("Wordlist", wordlist.display().to_string()),
                    ("Threads", config.concurrency.to_string()),
                ],
            );

            let report = scanner::execute(
                RunOptions::new(cli, engine, SuccessStyle::Cracked),
                config,
                source,
                probe,
            )
            .await?;
            if report.successes().is_empty() && report.termination != TerminationReason::Cancelled {
                println!("{}", "\n[!] Failed to crack the hash".red());
            }
            output::finish(cli, engine, &report, "Cracking finished")
        }

        Commands::Hashid { hash, generate: algorithm } => match algorithm {
            Some(algorithm) => execute_generate(hash, algorithm),
            None => {
                let analysis = analyze(hash);
                output::print_hash_analysis(&analysis, cli.verbose > 0);
                Ok(())
            }
        },
    }
}

#[cfg(feature = "ssh")]
async fn execute_ssh(
    cli: &Cli,
    file_config: Option<&RunSettings>,
    target: &str,
    port: u16,
    user: &str,
    wordlist: &std::path::Path,
    engine: &EngineArgs,
) -> Result<()> {
    use probeforge_probes::SshProbe;

    let config = build_run_config(engine, file_config, SSH_DEFAULTS)?;
    let probe = SshProbe::new(target, port, user)
        .with_timeout(config.probe_timeout.unwrap_or(SSH_DEFAULTS.timeout));
    let source = CandidateSource::from_words(probeforge_core::load_wordlist(wordlist)?)?;

    output::print_banner(
        cli,
        &[
            ("Starting SSH brute force against", probe.target()),
            ("Testing username", user.to_string()),
            ("Using wordlist", wordlist.display().to_string()),
            ("Threads", config.concurrency.to_string()),
            (
                "Timeout",
                utils::format_duration(config.probe_timeout.unwrap_or(SSH_DEFAULTS.timeout)),
            ),
            (
                "Delay",
                config
                    .delay
                    .map(utils::format_duration)
                    .unwrap_or_else(|| "none".to_string()),
            ),
        ],
    );

    let report = scanner::execute(
        RunOptions::new(cli, engine, SuccessStyle::Login),
        config,
        source,
        probe,
    )
    .await?;
    output::finish(cli, engine, &report, "Brute force completed!")
}

#[cfg(not(feature = "ssh"))]
async fn execute_ssh(
    _cli: &Cli,
    _file_config: Option<&RunSettings>,
    _target: &str,
    _port: u16,
    _user: &str,
    _wordlist: &std::path::Path,
    _engine: &EngineArgs,
) -> Result<()> {
    bail!("SSH support not compiled in; rebuild with `--features ssh`")
}

fn execute_generate(text: &str, algorithm: &str) -> Result<()> {
    match generate(text, algorithm) {
        Ok(digest) => {
            println!("{}", format!("\n[+] {} hash for '{}':", algorithm.to_lowercase(), text).green());
            println!("{}", digest);
            Ok(())
        }
        Err(e) => {
            println!("{}", format!("[!] Algorithm {} not supported", algorithm).red());
            let available: Vec<&str> = HashAlgorithm::ALL.iter().map(|a| a.as_str()).collect();
            println!("{}", format!("Available algorithms: {}", available.join(", ")).yellow());
            Err(e.into())
        }
    }
}

fn hash_algorithm(hash_type: HashType) -> HashAlgorithm {
    match hash_type {
        HashType::Md5 => HashAlgorithm::Md5,
        HashType::Sha1 => HashAlgorithm::Sha1,
        HashType::Sha256 => HashAlgorithm::Sha256,
        HashType::Sha512 => HashAlgorithm::Sha512,
        HashType::Ntlm => HashAlgorithm::Ntlm,
    }
}

/// Liveness pass over `hosts`; every host is tried even with early exit on
async fn discover_hosts(
    cli: &Cli,
    engine: &EngineArgs,
    config: &RunConfig,
    hosts: Vec<String>,
    method: DiscoveryMethod,
    wait: Duration,
) -> Result<Report> {
    output::print_banner(cli, &[("Host discovery", method.as_str().to_string())]);
    // `ping` needs headroom over its own deadline to exit
    let discovery_config = RunConfig {
        probe_timeout: Some(wait + Duration::from_secs(1)),
        early_exit: false,
        output: None,
        ..config.clone()
    };
    let source = CandidateSource::from_words(hosts)?;
    let report = scanner::execute(
        RunOptions::new(cli, engine, SuccessStyle::Alive),
        discovery_config,
        source,
        HostDiscoveryProbe::new(method).with_wait(wait),
    )
    .await?;
    info!(
        method = method.as_str(),
        tested = report.completed,
        alive = report.counts.success,
        "Host discovery finished"
    );
    Ok(report)
}

/// Hosts that answered, in target order
fn live_hosts(report: &Report) -> Vec<String> {
    let mut found: Vec<_> = report.successes().iter().map(|f| &f.candidate).collect();
    found.sort_by_key(|candidate| candidate.index());
    found.into_iter().map(|candidate| candidate.value().to_string()).collect()
}

/// Layer command-line options over the config file over command defaults
pub fn build_run_config(
    engine: &EngineArgs,
    file_config: Option<&RunSettings>,
    defaults: CommandDefaults,
) -> Result<RunConfig> {
    let mut config = RunConfig::builder()
        .concurrency(defaults.threads)
        .probe_timeout(defaults.timeout)
        .early_exit(defaults.early_exit)
        .build();
    config.delay = defaults.delay;
    if let Some(settings) = file_config {
        settings.apply_to(&mut config);
    }

    if let Some(threads) = engine.threads {
        config.concurrency = threads;
    }
    if let Some(timeout) = engine.timeout {
        config.probe_timeout = Some(utils::seconds(timeout).context("Invalid --timeout")?)
            .filter(|t| !t.is_zero());
    }
    if let Some(delay) = engine.delay {
        config.delay = Some(utils::seconds(delay).context("Invalid --delay")?).filter(|d| !d.is_zero());
    }
    if let Some(output) = &engine.output {
        config.output = Some(output.clone());
    }
    if engine.all {
        config.early_exit = false;
    }

    config.validate()?;
    info!(
        concurrency = config.concurrency,
        timeout_ms = config.probe_timeout.map(|t| t.as_millis() as u64),
        delay_ms = config.delay.map(|d| d.as_millis() as u64),
        early_exit = config.early_exit,
        "Run configuration"
    );
    Ok(config)
}

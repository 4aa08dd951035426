// Copyright 2020 LEXUGE
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

mod cli;
mod shutdown;
mod tls;

use anyhow::{Context, Result};
use log::{error, info};
use rdns::{
    config::{self, Config, ListenerSpec},
    listeners,
};
use structopt::StructOpt;

#[tokio::main]
async fn main() -> Result<()> {
    let opt = cli::Opt::from_args();
    simple_logger::SimpleLogger::new()
        .with_level(opt.level_filter())
        .init()
        .context("failed to initialize logger")?;

    if let Err(e) = run(opt).await {
        error!("fatal: {e:#}");
        return Err(e);
    }
    Ok(())
}

async fn run(opt: cli::Opt) -> Result<()> {
    let raw = tokio::fs::read_to_string(&opt.config)
        .await
        .with_context(|| format!("reading config `{}`", opt.config.display()))?;
    let mut cfg: Config = serde_yaml::from_str(&raw)
        .with_context(|| format!("parsing config `{}`", opt.config.display()))?;
    info!("loaded config `{}`", cfg.title);

    let resolvers = config::build_resolvers(&mut cfg)
        .await
        .context("building resolver graph")?;

    let mut tasks = Vec::new();
    for (id, listener) in cfg.listeners {
        let graph = resolvers
            .get(listener.resolver())
            .cloned()
            .with_context(|| format!("listener `{id}` names unknown resolver `{}`", listener.resolver()))?;

        let task: tokio::task::JoinHandle<std::io::Result<()>> = match listener {
            ListenerSpec::Udp { addr, .. } => {
                let id = id.clone();
                tokio::spawn(async move { listeners::serve_udp(id, addr, graph).await })
            }
            ListenerSpec::Tcp { addr, .. } => {
                let id = id.clone();
                tokio::spawn(async move { listeners::serve_tcp(id, addr, graph).await })
            }
            ListenerSpec::Dot { addr, cert, key, .. } => {
                let tls_config = tls::load_server_config(&cert, &key)
                    .with_context(|| format!("listener `{id}` TLS config"))?;
                let id = id.clone();
                tokio::spawn(async move { listeners::dot::serve_dot(id, addr, tls_config, graph).await })
            }
            ListenerSpec::Doh { addr, cert, key, .. } => {
                let tls_config = tls::load_server_config(&cert, &key)
                    .with_context(|| format!("listener `{id}` TLS config"))?;
                let id = id.clone();
                tokio::spawn(async move { listeners::doh::serve_doh(id, addr, tls_config, graph).await })
            }
            #[cfg(feature = "doq")]
            ListenerSpec::Doq { addr, cert, key, .. } => {
                let quic_config = tls::load_quic_server_config(&cert, &key)
                    .with_context(|| format!("listener `{id}` QUIC config"))?;
                let id = id.clone();
                tokio::spawn(async move { listeners::doq::serve_doq(id, addr, quic_config, graph).await })
            }
        };
        tasks.push(task);
    }

    if tasks.is_empty() {
        info!("no listeners configured, exiting");
        return Ok(());
    }

    tokio::select! {
        _ = shutdown::shutdown_signal() => {}
        result = futures_wait_any(tasks) => {
            if let Err(e) = result {
                error!("listener task failed: {e}");
            }
        }
    }

    Ok(())
}

/// Waits for the first listener task to finish (a fatal accept-loop
/// error) and surfaces it, since every `serve_*` loop is meant to run
/// forever otherwise.
async fn futures_wait_any(
    tasks: Vec<tokio::task::JoinHandle<std::io::Result<()>>>,
) -> std::io::Result<()> {
    let (result, _index, _rest) = futures::future::select_all(tasks).await;
    match result {
        Ok(inner) => inner,
        Err(join_err) => Err(std::io::Error::new(std::io::ErrorKind::Other, join_err)),
    }
}

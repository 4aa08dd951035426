//! Declarative YAML configuration, adapted from the teacher's JSON
//! config model (`droute::builders`): one node-spec enum per kind of
//! graph node, each implementing [`GraphNode`] so the whole resolvers
//! table can be topologically built in one pass, plus a listeners
//! table wiring the finished graph to inbound sockets.

use crate::{
    blocklist::{
        Blocklist, BlocklistV2, ClientBlocklist, EdeTemplate, ResponseBlocklistIp,
        ResponseBlocklistName, RuleEngine,
    },
    cache::{Cache, CacheConfig, LruBackend, RequestDedup, ShuffleMode},
    clients::{BootstrapResolver, DotClient, DohClient, TcpClient, UdpClient},
    graph::{topological_order, GraphError, GraphNode},
    groups::{FailBack, FailRotate, Fastest, FastestTcp, Random, RoundRobin, TruncateRetry},
    modifiers::{
        Drop as DropModifier, EcsModifier, EcsSource, Edns0Modifier, RateLimiter, Replace,
        ReplaceRule, ResponseCollapse, ResponseMinimize, SyslogModifier, TtlModifier,
    },
    router::{Predicate, Route, Router, TimeWindow},
    static_responder::{StaticRecord, StaticResponder, StaticTemplate},
    Label, RdnsError, Resolver, Result,
};
use domain::base::iana::{Class, Rcode, Rtype};
use serde::Deserialize;
use std::{
    collections::HashMap,
    net::SocketAddr,
    num::{NonZeroU32, NonZeroUsize},
    path::PathBuf,
    str::FromStr,
    sync::Arc,
    time::Duration,
};

/// Top-level configuration document (`SPEC_FULL.md` §4.15).
#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default = "default_title")]
    pub title: String,
    /// Plain-DNS server used to resolve `doh`/`dot` upstream hostnames,
    /// bypassing the system resolver. Absent means those upstreams rely
    /// on whatever the host's resolver does with the hostname.
    #[serde(default)]
    pub bootstrap: Option<SocketAddr>,
    pub listeners: HashMap<Label, ListenerSpec>,
    pub resolvers: HashMap<Label, NodeSpec>,
}

fn default_title() -> String {
    "routedns".into()
}

fn default_pool_size() -> usize {
    8
}

fn default_timeout_secs() -> u64 {
    5
}

/// An inbound listener, naming the resolver node it hands queries to.
#[derive(Debug, Deserialize)]
#[serde(tag = "protocol", rename_all = "kebab-case")]
pub enum ListenerSpec {
    Udp { addr: SocketAddr, resolver: Label },
    Tcp { addr: SocketAddr, resolver: Label },
    Dot {
        addr: SocketAddr,
        resolver: Label,
        cert: PathBuf,
        key: PathBuf,
    },
    Doh {
        addr: SocketAddr,
        resolver: Label,
        cert: PathBuf,
        key: PathBuf,
    },
    #[cfg(feature = "doq")]
    Doq {
        addr: SocketAddr,
        resolver: Label,
        cert: PathBuf,
        key: PathBuf,
    },
}

impl ListenerSpec {
    /// The resolver node this listener hands queries to, regardless of
    /// transport.
    pub fn resolver(&self) -> &Label {
        match self {
            ListenerSpec::Udp { resolver, .. }
            | ListenerSpec::Tcp { resolver, .. }
            | ListenerSpec::Dot { resolver, .. }
            | ListenerSpec::Doh { resolver, .. } => resolver,
            #[cfg(feature = "doq")]
            ListenerSpec::Doq { resolver, .. } => resolver,
        }
    }
}

/// One rule-engine source, deserialized then compiled/opened at build
/// time (regex compilation and GeoIP database opening are the only
/// fallible steps, matching the teacher's `RuleError` builder seam).
#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum RuleEngineSpec {
    /// Domain suffixes, one per line, inline in the config.
    Domain { rule: Label, domains: Vec<String> },
    /// Anchored regex patterns, each tagged with its own rule name.
    Regex { patterns: Vec<(String, Label)> },
    /// `/etc/hosts`-style `ip domain` pairs, inline in the config.
    Hosts { rule: Label, entries: Vec<String> },
    /// CIDR blocks tagged with a rule name.
    Cidr { rule: Label, blocks: Vec<String> },
    /// GeoIP country/ASN membership.
    Location { path: PathBuf, codes: Vec<(String, Label)> },
}

impl RuleEngineSpec {
    fn build(self) -> std::result::Result<RuleEngine, RdnsError> {
        Ok(match self {
            RuleEngineSpec::Domain { rule, domains } => {
                RuleEngine::domain_from_str(rule, &domains.join("\n"))
            }
            RuleEngineSpec::Regex { patterns } => RuleEngine::regex_from_patterns(patterns)
                .map_err(|e| RdnsError::Blocklist(e.into()))?,
            RuleEngineSpec::Hosts { rule, entries } => {
                RuleEngine::hosts_from_str(rule, &entries.join("\n"))
            }
            RuleEngineSpec::Cidr { rule, blocks } => {
                let pairs = blocks
                    .into_iter()
                    .filter_map(|b| b.parse().ok().map(|c| (c, rule.clone())))
                    .collect();
                RuleEngine::cidr_from_pairs(pairs)
            }
            RuleEngineSpec::Location { path, codes } => RuleEngine::location_from_path(&path, codes)
                .map_err(|e| RdnsError::Blocklist(e.into()))?,
        })
    }
}

fn build_engines(specs: Vec<RuleEngineSpec>) -> std::result::Result<Vec<RuleEngine>, RdnsError> {
    specs.into_iter().map(RuleEngineSpec::build).collect()
}

/// An EDE template attached to a blocked response.
#[derive(Debug, Deserialize)]
pub struct EdeSpec {
    pub info_code: u16,
    pub template: String,
}

impl From<EdeSpec> for EdeTemplate {
    fn from(spec: EdeSpec) -> Self {
        EdeTemplate::new(spec.info_code, spec.template)
    }
}

/// One row of a [`RouterSpec`] route table.
#[derive(Debug, Deserialize)]
pub struct RouteSpec {
    pub label: Label,
    #[serde(default)]
    pub name_pattern: Option<String>,
    #[serde(default)]
    pub record_types: Vec<String>,
    #[serde(default)]
    pub classes: Vec<String>,
    #[serde(default)]
    pub source_cidrs: Vec<String>,
    #[serde(default)]
    pub listener_id: Option<Label>,
    #[serde(default)]
    pub time_of_day: Option<(u32, u32)>,
    #[serde(default)]
    pub weekdays: Vec<String>,
    #[serde(default)]
    pub sni: Option<String>,
    #[serde(default)]
    pub doh_path: Option<String>,
    /// When set, this route fires on the first *non*-match of its
    /// predicate conjunction instead of the first match.
    #[serde(default)]
    pub invert: bool,
    pub target: Label,
}

fn parse_class(s: &str) -> Option<Class> {
    match s.to_ascii_uppercase().as_str() {
        "IN" => Some(Class::In),
        "CH" => Some(Class::Ch),
        "HS" => Some(Class::Hs),
        _ => None,
    }
}

fn parse_weekday(s: &str) -> Option<chrono::Weekday> {
    match s.to_ascii_lowercase().as_str() {
        "mon" | "monday" => Some(chrono::Weekday::Mon),
        "tue" | "tuesday" => Some(chrono::Weekday::Tue),
        "wed" | "wednesday" => Some(chrono::Weekday::Wed),
        "thu" | "thursday" => Some(chrono::Weekday::Thu),
        "fri" | "friday" => Some(chrono::Weekday::Fri),
        "sat" | "saturday" => Some(chrono::Weekday::Sat),
        "sun" | "sunday" => Some(chrono::Weekday::Sun),
        _ => None,
    }
}

impl RouteSpec {
    fn predicates(&self) -> std::result::Result<Vec<Predicate>, RdnsError> {
        let mut predicates = Vec::new();
        if let Some(pattern) = &self.name_pattern {
            let re = regex::Regex::new(pattern)
                .map_err(|e| RdnsError::Modifier(crate::modifiers::ModifierError::Regex(e)))?;
            predicates.push(Predicate::NamePattern(re));
        }
        if !self.record_types.is_empty() {
            let types = self
                .record_types
                .iter()
                .map(|t| Rtype::from_str(t).unwrap_or(Rtype::Any))
                .collect();
            predicates.push(Predicate::RecordType(types));
        }
        if !self.classes.is_empty() {
            let classes = self.classes.iter().filter_map(|c| parse_class(c)).collect();
            predicates.push(Predicate::Class(classes));
        }
        if !self.source_cidrs.is_empty() {
            let cidrs = self
                .source_cidrs
                .iter()
                .filter_map(|c| c.parse().ok())
                .collect();
            predicates.push(Predicate::SourceCidr(cidrs));
        }
        if let Some(id) = &self.listener_id {
            predicates.push(Predicate::ListenerId(id.clone()));
        }
        if let Some((start, end)) = self.time_of_day {
            predicates.push(Predicate::TimeOfDay(TimeWindow {
                start_minute: start,
                end_minute: end,
            }));
        }
        if !self.weekdays.is_empty() {
            let days = self.weekdays.iter().filter_map(|d| parse_weekday(d)).collect();
            predicates.push(Predicate::Weekday(days));
        }
        if let Some(sni) = &self.sni {
            predicates.push(Predicate::Sni(sni.clone()));
        }
        if let Some(path) = &self.doh_path {
            predicates.push(Predicate::DohPath(path.clone()));
        }
        Ok(predicates)
    }
}

/// One configured record for `static-responder`/`static-template`.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum StaticRecordSpec {
    A { addr: std::net::Ipv4Addr },
    Aaaa { addr: std::net::Ipv6Addr },
    Cname { target: String },
    Txt { text: String },
}

impl From<StaticRecordSpec> for StaticRecord {
    fn from(spec: StaticRecordSpec) -> Self {
        match spec {
            StaticRecordSpec::A { addr } => StaticRecord::A(addr),
            StaticRecordSpec::Aaaa { addr } => StaticRecord::Aaaa(addr),
            StaticRecordSpec::Cname { target } => StaticRecord::Cname(target),
            StaticRecordSpec::Txt { text } => StaticRecord::Txt(text),
        }
    }
}

/// Every kind of node that can appear in `resolvers`. Field names match
/// `SPEC_FULL.md`'s per-module configuration tables.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum NodeSpec {
    Udp {
        addr: SocketAddr,
        #[serde(default = "default_pool_size")]
        pool_size: usize,
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
    },
    Tcp {
        addr: SocketAddr,
        #[serde(default = "default_pool_size")]
        pool_size: usize,
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
    },
    Dot {
        domain: String,
        addr: SocketAddr,
        #[serde(default = "default_pool_size")]
        pool_size: usize,
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
    },
    Doh {
        url: String,
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
    },
    Cache {
        downstream: Label,
        #[serde(default = "default_cache_capacity")]
        capacity: usize,
        #[serde(default)]
        negative_ttl: Option<u32>,
        #[serde(default)]
        prefetch_trigger: Option<u64>,
        #[serde(default)]
        prefetch_eligible: Option<u64>,
        #[serde(default)]
        harden_below_nxdomain: bool,
        #[serde(default)]
        shuffle: ShuffleMode,
        #[serde(default)]
        flush_query: Option<String>,
    },
    Dedup {
        downstream: Label,
    },
    RoundRobin {
        children: Vec<Label>,
        #[serde(default)]
        servfail_error: bool,
    },
    FailRotate {
        children: Vec<Label>,
        #[serde(default)]
        servfail_error: bool,
    },
    FailBack {
        children: Vec<Label>,
        #[serde(default = "default_reset_after")]
        reset_after_secs: u64,
        #[serde(default)]
        servfail_error: bool,
    },
    Random {
        children: Vec<Label>,
        #[serde(default = "default_reset_after")]
        reset_after_secs: u64,
        #[serde(default)]
        servfail_error: bool,
    },
    Fastest {
        children: Vec<Label>,
        #[serde(default)]
        servfail_error: bool,
    },
    FastestTcp {
        primary: Label,
        #[serde(default = "default_fastest_tcp_port")]
        port: u16,
        #[serde(default)]
        wait_all: bool,
        #[serde(default)]
        success_ttl_min: u32,
    },
    TruncateRetry {
        primary: Label,
        retry: Label,
    },
    Router {
        routes: Vec<RouteSpec>,
        default: Label,
    },
    Blocklist {
        engine: RuleEngineSpec,
        action: crate::blocklist::BlockAction,
        #[serde(default)]
        ede: Option<EdeSpec>,
        #[serde(default)]
        block_resolver: Option<Label>,
    },
    BlocklistV2 {
        engines: Vec<RuleEngineSpec>,
        #[serde(default)]
        allowlist: Option<Vec<RuleEngineSpec>>,
        action: crate::blocklist::BlockAction,
        #[serde(default)]
        ede: Option<EdeSpec>,
        #[serde(default)]
        block_resolver: Option<Label>,
        #[serde(default)]
        allow_resolver: Option<Label>,
        downstream: Label,
    },
    ResponseBlocklistIp {
        engines: Vec<RuleEngineSpec>,
        #[serde(default)]
        inverted: bool,
        action: crate::blocklist::BlockAction,
        #[serde(default)]
        filter_only: bool,
        #[serde(default)]
        block_resolver: Option<Label>,
        downstream: Label,
    },
    ResponseBlocklistName {
        engines: Vec<RuleEngineSpec>,
        #[serde(default)]
        inverted: bool,
        action: crate::blocklist::BlockAction,
        #[serde(default)]
        filter_only: bool,
        #[serde(default)]
        block_resolver: Option<Label>,
        downstream: Label,
    },
    ClientBlocklist {
        engines: Vec<RuleEngineSpec>,
        #[serde(default)]
        inverted: bool,
        action: crate::blocklist::BlockAction,
        #[serde(default)]
        block_resolver: Option<Label>,
        downstream: Label,
    },
    Replace {
        rules: Vec<(String, String)>,
        downstream: Label,
    },
    Ttl {
        min: u32,
        max: u32,
        downstream: Label,
    },
    EcsStatic {
        addr: std::net::IpAddr,
        prefix: u8,
        downstream: Label,
    },
    EcsDynamic {
        v4_prefix: u8,
        v6_prefix: u8,
        downstream: Label,
    },
    Edns0 {
        #[serde(default)]
        dnssec_ok: Option<bool>,
        #[serde(default)]
        udp_payload_size: Option<u16>,
        downstream: Label,
    },
    ResponseMinimize {
        downstream: Label,
    },
    ResponseCollapse {
        downstream: Label,
    },
    Drop,
    RateLimiter {
        queries_per_second: u32,
        burst: u32,
        #[serde(default = "default_prefix4")]
        prefix4: u8,
        #[serde(default = "default_prefix6")]
        prefix6: u8,
        #[serde(default)]
        limit_resolver: Option<Label>,
        downstream: Label,
    },
    Syslog {
        #[serde(default = "default_title")]
        process_name: String,
        downstream: Label,
    },
    StaticResponder {
        records: Vec<StaticRecordSpec>,
        #[serde(default = "default_ttl")]
        ttl: u32,
    },
    StaticTemplate {
        record: StaticRecordSpec,
        #[serde(default = "default_ttl")]
        ttl: u32,
    },
    NxDomain,
    Blackhole,
    #[cfg(feature = "dnssec")]
    DnssecValidate {
        downstream: Label,
        /// Resolver used to fetch missing DNSKEY/DS records. Often the
        /// same label as `downstream`, but kept separate since a
        /// validator for an internal zone may need a different path
        /// to the authoritative servers than general traffic does.
        key_source: Label,
        #[serde(default)]
        trust_anchor: Vec<String>,
        #[serde(default = "default_keystore_capacity")]
        keystore_capacity: usize,
        #[serde(default)]
        enforce: bool,
    },
}

#[cfg(feature = "dnssec")]
fn default_keystore_capacity() -> usize {
    2_000
}

fn default_cache_capacity() -> usize {
    10_000
}

fn default_reset_after() -> u64 {
    300
}

fn default_fastest_tcp_port() -> u16 {
    443
}

fn default_prefix4() -> u8 {
    32
}

fn default_prefix6() -> u8 {
    128
}

fn default_ttl() -> u32 {
    crate::static_responder::DEFAULT_TTL
}

impl GraphNode for NodeSpec {
    fn dependencies(&self) -> Vec<Label> {
        match self {
            NodeSpec::Cache { downstream, .. }
            | NodeSpec::Dedup { downstream }
            | NodeSpec::Replace { downstream, .. }
            | NodeSpec::Ttl { downstream, .. }
            | NodeSpec::EcsStatic { downstream, .. }
            | NodeSpec::EcsDynamic { downstream, .. }
            | NodeSpec::Edns0 { downstream, .. }
            | NodeSpec::ResponseMinimize { downstream }
            | NodeSpec::ResponseCollapse { downstream }
            | NodeSpec::Syslog { downstream, .. } => vec![downstream.clone()],

            NodeSpec::BlocklistV2 { downstream, block_resolver, allow_resolver, .. } => {
                let mut deps = vec![downstream.clone()];
                deps.extend(block_resolver.clone());
                deps.extend(allow_resolver.clone());
                deps
            }
            NodeSpec::ResponseBlocklistIp { downstream, block_resolver, .. }
            | NodeSpec::ResponseBlocklistName { downstream, block_resolver, .. }
            | NodeSpec::ClientBlocklist { downstream, block_resolver, .. } => {
                let mut deps = vec![downstream.clone()];
                deps.extend(block_resolver.clone());
                deps
            }
            NodeSpec::RateLimiter { downstream, limit_resolver, .. } => {
                let mut deps = vec![downstream.clone()];
                deps.extend(limit_resolver.clone());
                deps
            }

            NodeSpec::RoundRobin { children, .. }
            | NodeSpec::FailRotate { children, .. }
            | NodeSpec::Random { children, .. }
            | NodeSpec::Fastest { children, .. } => children.clone(),

            NodeSpec::FailBack { children, .. } => children.clone(),

            NodeSpec::FastestTcp { primary, .. } => vec![primary.clone()],
            NodeSpec::TruncateRetry { primary, retry } => vec![primary.clone(), retry.clone()],

            NodeSpec::Router { routes, default } => {
                let mut deps: Vec<Label> = routes.iter().map(|r| r.target.clone()).collect();
                deps.push(default.clone());
                deps
            }

            #[cfg(feature = "dnssec")]
            NodeSpec::DnssecValidate { downstream, key_source, .. } => {
                vec![downstream.clone(), key_source.clone()]
            }

            NodeSpec::Blocklist { block_resolver, .. } => block_resolver.clone().into_iter().collect(),

            NodeSpec::Udp { .. }
            | NodeSpec::Tcp { .. }
            | NodeSpec::Dot { .. }
            | NodeSpec::Doh { .. }
            | NodeSpec::Drop
            | NodeSpec::StaticResponder { .. }
            | NodeSpec::StaticTemplate { .. }
            | NodeSpec::NxDomain
            | NodeSpec::Blackhole => vec![],
        }
    }
}

/// Builds every node in `config.resolvers` in dependency order,
/// returning the fully wired label -> resolver map. Async because
/// `doh` upstream construction opens an HTTP client.
pub async fn build_resolvers(config: &mut Config) -> std::result::Result<HashMap<Label, Arc<dyn Resolver>>, RdnsError> {
    let order = topological_order(&config.resolvers).map_err(RdnsError::Graph)?;
    let mut built: HashMap<Label, Arc<dyn Resolver>> = HashMap::new();

    let bootstrap = config
        .bootstrap
        .map(BootstrapResolver::new)
        .transpose()
        .map_err(RdnsError::Client)?
        .map(Arc::new);

    for label in order {
        let spec = config
            .resolvers
            .remove(&label)
            .expect("label came from this same map");
        let resolver = build_one(&label, spec, &built, bootstrap.as_ref()).await?;
        built.insert(label, resolver);
    }

    Ok(built)
}

fn lookup(
    built: &HashMap<Label, Arc<dyn Resolver>>,
    label: &Label,
) -> std::result::Result<Arc<dyn Resolver>, RdnsError> {
    built
        .get(label)
        .cloned()
        .ok_or_else(|| RdnsError::Graph(GraphError::MissingReference(label.clone(), label.clone())))
}

async fn build_one(
    label: &Label,
    spec: NodeSpec,
    built: &HashMap<Label, Arc<dyn Resolver>>,
    bootstrap: Option<&Arc<BootstrapResolver>>,
) -> std::result::Result<Arc<dyn Resolver>, RdnsError> {
    Ok(match spec {
        NodeSpec::Udp { addr, pool_size, timeout_secs } => Arc::new(
            UdpClient::new(addr, pool_size, Duration::from_secs(timeout_secs))
                .map_err(RdnsError::Client)?,
        ),
        NodeSpec::Tcp { addr, pool_size, timeout_secs } => Arc::new(
            TcpClient::new(addr, pool_size, Duration::from_secs(timeout_secs))
                .map_err(RdnsError::Client)?,
        ),
        NodeSpec::Dot { domain, addr, pool_size, timeout_secs } => Arc::new(
            DotClient::new(domain, addr, pool_size, Duration::from_secs(timeout_secs))
                .map_err(RdnsError::Client)?,
        ),
        NodeSpec::Doh { url, timeout_secs } => {
            let pinned = match bootstrap {
                Some(b) => {
                    let host = doh_url_host(&url)?;
                    Some(b.resolve_hostname(&host).await.map_err(RdnsError::Client)?)
                }
                None => None,
            };
            Arc::new(
                DohClient::new(url, Duration::from_secs(timeout_secs), pinned)
                    .await
                    .map_err(RdnsError::Client)?,
            )
        }
        NodeSpec::Cache {
            downstream,
            capacity,
            negative_ttl,
            prefetch_trigger,
            prefetch_eligible,
            harden_below_nxdomain,
            shuffle,
            flush_query,
        } => {
            let downstream = lookup(built, &downstream)?;
            let mut config = CacheConfig::default();
            if let Some(v) = negative_ttl {
                config.negative_ttl = v;
            }
            if let Some(v) = prefetch_trigger {
                config.prefetch_trigger = v;
            }
            if let Some(v) = prefetch_eligible {
                config.prefetch_eligible = v;
            }
            config.harden_below_nxdomain = harden_below_nxdomain;
            config.shuffle = shuffle;
            config.flush_query = flush_query;
            let backend = Arc::new(LruBackend::new(
                NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(1).unwrap()),
            ));
            Arc::new(Cache::new(backend, downstream, config))
        }
        NodeSpec::Dedup { downstream } => Arc::new(RequestDedup::new(lookup(built, &downstream)?)),
        NodeSpec::RoundRobin { children, servfail_error } => Arc::new(RoundRobin::new(
            label.clone(),
            resolve_children(built, &children)?,
            servfail_error,
        )),
        NodeSpec::FailRotate { children, servfail_error } => Arc::new(FailRotate::new(
            label.clone(),
            resolve_children(built, &children)?,
            servfail_error,
        )),
        NodeSpec::FailBack { children, reset_after_secs, servfail_error } => Arc::new(FailBack::new(
            label.clone(),
            resolve_children(built, &children)?,
            Duration::from_secs(reset_after_secs),
            servfail_error,
        )),
        NodeSpec::Random { children, reset_after_secs, servfail_error } => Arc::new(Random::new(
            label.clone(),
            resolve_children(built, &children)?,
            Duration::from_secs(reset_after_secs),
            servfail_error,
        )),
        NodeSpec::Fastest { children, servfail_error } => Arc::new(Fastest::new(
            label.clone(),
            resolve_children(built, &children)?,
            servfail_error,
        )),
        NodeSpec::FastestTcp { primary, port, wait_all, success_ttl_min } => Arc::new(FastestTcp::new(
            label.clone(),
            lookup(built, &primary)?,
            port,
            wait_all,
            success_ttl_min,
        )),
        NodeSpec::TruncateRetry { primary, retry } => {
            Arc::new(TruncateRetry::new(label.clone(), lookup(built, &primary)?, lookup(built, &retry)?))
        }
        NodeSpec::Router { routes, default } => {
            let mut built_routes = Vec::with_capacity(routes.len());
            for route in routes {
                let target = lookup(built, &route.target)?;
                let invert = route.invert;
                let predicates = route.predicates()?;
                built_routes.push(Route {
                    label: route.label.clone(),
                    predicates,
                    invert,
                    target,
                });
            }
            Arc::new(Router::new(built_routes, lookup(built, &default)?))
        }
        NodeSpec::Blocklist { engine, action, ede, block_resolver } => {
            let block_resolver = block_resolver.map(|l| lookup(built, &l)).transpose()?;
            Arc::new(Blocklist::new(engine.build()?, action, ede.map(Into::into), block_resolver))
        }
        NodeSpec::BlocklistV2 { engines, allowlist, action, ede, block_resolver, allow_resolver, downstream } => {
            let block_resolver = block_resolver.map(|l| lookup(built, &l)).transpose()?;
            let allow_resolver = allow_resolver.map(|l| lookup(built, &l)).transpose()?;
            Arc::new(BlocklistV2::new(
                build_engines(engines)?,
                allowlist.map(build_engines).transpose()?,
                action,
                ede.map(Into::into),
                block_resolver,
                allow_resolver,
                lookup(built, &downstream)?,
            ))
        }
        NodeSpec::ResponseBlocklistIp { engines, inverted, action, filter_only, block_resolver, downstream } => {
            let block_resolver = block_resolver.map(|l| lookup(built, &l)).transpose()?;
            Arc::new(ResponseBlocklistIp::new(
                build_engines(engines)?,
                inverted,
                action,
                filter_only,
                block_resolver,
                lookup(built, &downstream)?,
            ))
        }
        NodeSpec::ResponseBlocklistName { engines, inverted, action, filter_only, block_resolver, downstream } => {
            let block_resolver = block_resolver.map(|l| lookup(built, &l)).transpose()?;
            Arc::new(ResponseBlocklistName::new(
                build_engines(engines)?,
                inverted,
                action,
                filter_only,
                block_resolver,
                lookup(built, &downstream)?,
            ))
        }
        NodeSpec::ClientBlocklist { engines, inverted, action, block_resolver, downstream } => {
            let block_resolver = block_resolver.map(|l| lookup(built, &l)).transpose()?;
            Arc::new(ClientBlocklist::new(
                build_engines(engines)?,
                inverted,
                action,
                block_resolver,
                lookup(built, &downstream)?,
            ))
        }
        NodeSpec::Replace { rules, downstream } => {
            let mut compiled = Vec::with_capacity(rules.len());
            for (pattern, replacement) in rules {
                let re = regex::Regex::new(&pattern)
                    .map_err(|e| RdnsError::Modifier(crate::modifiers::ModifierError::Regex(e)))?;
                compiled.push(ReplaceRule::new(re, replacement));
            }
            Arc::new(Replace::new(compiled, lookup(built, &downstream)?))
        }
        NodeSpec::Ttl { min, max, downstream } => Arc::new(TtlModifier::new(min, max, lookup(built, &downstream)?)),
        NodeSpec::EcsStatic { addr, prefix, downstream } => Arc::new(EcsModifier::new(
            EcsSource::Static(addr, prefix),
            lookup(built, &downstream)?,
        )),
        NodeSpec::EcsDynamic { v4_prefix, v6_prefix, downstream } => Arc::new(EcsModifier::new(
            EcsSource::Dynamic { v4_prefix, v6_prefix },
            lookup(built, &downstream)?,
        )),
        NodeSpec::Edns0 { dnssec_ok, udp_payload_size, downstream } => {
            Arc::new(Edns0Modifier::new(dnssec_ok, udp_payload_size, lookup(built, &downstream)?))
        }
        NodeSpec::ResponseMinimize { downstream } => Arc::new(ResponseMinimize::new(lookup(built, &downstream)?)),
        NodeSpec::ResponseCollapse { downstream } => Arc::new(ResponseCollapse::new(lookup(built, &downstream)?)),
        NodeSpec::Drop => Arc::new(DropModifier),
        NodeSpec::RateLimiter { queries_per_second, burst, prefix4, prefix6, limit_resolver, downstream } => {
            let limit_resolver = limit_resolver.map(|l| lookup(built, &l)).transpose()?;
            Arc::new(RateLimiter::new(
                NonZeroU32::new(queries_per_second).unwrap_or(NonZeroU32::new(1).unwrap()),
                NonZeroU32::new(burst).unwrap_or(NonZeroU32::new(1).unwrap()),
                prefix4,
                prefix6,
                limit_resolver,
                lookup(built, &downstream)?,
            ))
        }
        NodeSpec::Syslog { process_name, downstream } => Arc::new(
            SyslogModifier::new(process_name, syslog::Facility::LOG_DAEMON, lookup(built, &downstream)?)
                .map_err(RdnsError::Modifier)?,
        ),
        NodeSpec::StaticResponder { records, ttl } => Arc::new(StaticResponder::new(
            records.into_iter().map(Into::into).collect(),
            Rcode::NoError,
            ttl,
        )),
        NodeSpec::StaticTemplate { record, ttl } => {
            Arc::new(StaticTemplate::new(record.into(), Rcode::NoError, ttl))
        }
        NodeSpec::NxDomain => Arc::new(StaticResponder::nxdomain()),
        NodeSpec::Blackhole => Arc::new(StaticResponder::blackhole()),
        #[cfg(feature = "dnssec")]
        NodeSpec::DnssecValidate {
            downstream,
            key_source,
            trust_anchor,
            keystore_capacity,
            enforce,
        } => {
            let trust_anchor = trust_anchor
                .iter()
                .map(|s| parse_ds(s))
                .collect::<std::result::Result<Vec<_>, RdnsError>>()?;
            let validator = crate::dnssec::Validator::new(
                NonZeroUsize::new(keystore_capacity).unwrap_or(NonZeroUsize::new(1).unwrap()),
                lookup(built, &key_source)?,
                trust_anchor,
            );
            Arc::new(crate::modifiers::DnssecValidate::new(
                Arc::new(validator),
                lookup(built, &downstream)?,
                enforce,
            ))
        }
    })
}

/// Parse a DS record in zone-file presentation format (`key-tag
/// algorithm digest-type hex-digest`), the form a trust anchor is
/// ordinarily copied from IANA/root-zone documentation in.
#[cfg(feature = "dnssec")]
fn parse_ds(s: &str) -> std::result::Result<domain::base::rdata::rfc4034::Ds<bytes::Bytes>, RdnsError> {
    let mut parts = s.split_whitespace();
    let bad = || RdnsError::MalformedMessage(format!("invalid trust anchor DS record: `{s}`"));
    let key_tag: u16 = parts.next().ok_or_else(bad)?.parse().map_err(|_| bad())?;
    let algorithm: u8 = parts.next().ok_or_else(bad)?.parse().map_err(|_| bad())?;
    let digest_type: u8 = parts.next().ok_or_else(bad)?.parse().map_err(|_| bad())?;
    let digest_hex = parts.next().ok_or_else(bad)?;
    let digest = hex_decode(digest_hex).ok_or_else(bad)?;
    Ok(domain::base::rdata::rfc4034::Ds::new(
        key_tag,
        domain::base::iana::SecAlg::from_int(algorithm),
        domain::base::iana::DigestAlg::from_int(digest_type),
        bytes::Bytes::from(digest),
    ))
}

#[cfg(feature = "dnssec")]
fn hex_decode(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}

/// Extract the hostname a `doh` node's URL targets, for resolving it
/// through the configured bootstrap resolver before the `reqwest`
/// client is built.
fn doh_url_host(url: &str) -> std::result::Result<String, RdnsError> {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_owned))
        .ok_or_else(|| RdnsError::MalformedMessage(format!("invalid doh url: `{url}`")))
}

fn resolve_children(
    built: &HashMap<Label, Arc<dyn Resolver>>,
    labels: &[Label],
) -> std::result::Result<Vec<(Label, Arc<dyn Resolver>)>, RdnsError> {
    labels
        .iter()
        .map(|l| lookup(built, l).map(|r| (l.clone(), r)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_minimal_config() {
        let yaml = r#"
title: test
listeners:
  main:
    protocol: udp
    addr: "127.0.0.1:5300"
    resolver: upstream
resolvers:
  upstream:
    type: udp
    addr: "1.1.1.1:53"
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.resolvers.len(), 1);
        assert_eq!(config.listeners.len(), 1);
    }

    #[tokio::test]
    async fn builds_a_router_over_two_upstreams() {
        let yaml = r#"
title: test
listeners: {}
resolvers:
  a:
    type: udp
    addr: "1.1.1.1:53"
  b:
    type: udp
    addr: "8.8.8.8:53"
  grp:
    type: round-robin
    children: [a, b]
  top:
    type: router
    routes: []
    default: grp
"#;
        let mut config: Config = serde_yaml::from_str(yaml).unwrap();
        let built = build_resolvers(&mut config).await.unwrap();
        assert!(built.contains_key(&Label::from("top")));
    }

    #[tokio::test]
    async fn missing_downstream_is_rejected() {
        let yaml = r#"
title: test
listeners: {}
resolvers:
  top:
    type: ttl
    min: 0
    max: 300
    downstream: ghost
"#;
        let mut config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(matches!(build_resolvers(&mut config).await, Err(RdnsError::Graph(_))));
    }
}

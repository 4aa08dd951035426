//! End-to-end tests building a resolver graph straight from a YAML
//! configuration document, the way `routedns`'s own startup path does.

use domain::base::{iana::Rcode, Dname, MessageBuilder};
use rdns::{
    config::{build_resolvers, Config},
    ClientInfo, Label, RdnsError,
};

fn query_for(name: &str) -> domain::base::Message<bytes::Bytes> {
    let mut builder = MessageBuilder::from_target(bytes::BytesMut::new()).unwrap();
    builder.header_mut().set_rd(true);
    let mut builder = builder.question();
    builder
        .push((
            Dname::<bytes::Bytes>::from_chars(format!("{name}.").chars()).unwrap(),
            domain::base::iana::Rtype::A,
            domain::base::iana::Class::In,
        ))
        .unwrap();
    builder.into_message()
}

const GRAPH_YAML: &str = r#"
title: test-graph
listeners: {}
resolvers:
  catch-all:
    type: static-responder
    records:
      - type: a
        addr: 10.0.0.1
    ttl: 120
  blocked:
    type: nx-domain
  front-door:
    type: router
    routes:
      - label: block-internal
        name_pattern: '\.blocked\.$'
        target: blocked
    default: catch-all
"#;

#[tokio::test]
async fn builds_and_serves_from_yaml_config() {
    let mut cfg: Config = serde_yaml::from_str(GRAPH_YAML).expect("fixture parses");
    let resolvers = build_resolvers(&mut cfg).await.expect("graph builds");

    let front_door = resolvers
        .get(&Label::from("front-door"))
        .expect("front-door node was built")
        .clone();
    let client = ClientInfo::new(None, Label::from("test"));

    let blocked = front_door
        .resolve(query_for("host.blocked"), &client)
        .await
        .unwrap();
    assert_eq!(blocked.header().rcode(), Rcode::NXDomain);

    let allowed = front_door
        .resolve(query_for("host.example"), &client)
        .await
        .unwrap();
    assert_eq!(allowed.header().rcode(), Rcode::NoError);
    assert_eq!(allowed.answer().unwrap().count(), 1);
}

const CYCLE_YAML: &str = r#"
title: bad-graph
listeners: {}
resolvers:
  a:
    type: dedup
    downstream: b
  b:
    type: dedup
    downstream: a
"#;

#[tokio::test]
async fn cyclic_config_is_rejected_before_serving() {
    let mut cfg: Config = serde_yaml::from_str(CYCLE_YAML).expect("fixture parses");
    let err = build_resolvers(&mut cfg).await.unwrap_err();
    assert!(matches!(err, RdnsError::Graph(_)));
}

const MISSING_REFERENCE_YAML: &str = r#"
title: bad-graph
listeners: {}
resolvers:
  a:
    type: dedup
    downstream: ghost
"#;

#[tokio::test]
async fn missing_reference_is_rejected_before_serving() {
    let mut cfg: Config = serde_yaml::from_str(MISSING_REFERENCE_YAML).expect("fixture parses");
    let err = build_resolvers(&mut cfg).await.unwrap_err();
    assert!(matches!(err, RdnsError::Graph(_)));
}

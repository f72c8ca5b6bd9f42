//! Tests of the query orchestration with stand-in resolvers.

use std::io;
use std::net::Ipv4Addr;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use domain::base::iana::{Rcode, Rtype};
use domain::base::name::{Name, ParsedName};
use domain::base::{Message, MessageBuilder};
use domain::rdata::{Soa, A};
use nsengine::config::{DnsConfig, LocalConfig, RecursionConfig};
use nsengine::engine::Engine;
use nsengine::error::ResolveError;
use nsengine::local::{HostLookup, LocalResolver};
use nsengine::recursive::{Forwarder, Upstream};
use nsengine::response::{Outcome, Query, ResourceData};
use nsengine::store::{
    Authority, Id, Record, RecordData, RecordType, Store, Zone,
};
use nsengine::wire;

//------------ Stand-ins -----------------------------------------------------

/// An upstream answering every query with one A record.
#[derive(Default)]
struct FakeUpstream {
    calls: AtomicUsize,
    behavior: Behavior,
}

#[derive(Default)]
enum Behavior {
    #[default]
    Answer,
    Timeout,
}

impl Upstream for FakeUpstream {
    async fn query(
        &self,
        _name: &str,
        rtype: RecordType,
    ) -> Result<Vec<RecordData>, ResolveError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.behavior {
            Behavior::Answer if rtype == RecordType::A => {
                Ok(vec![RecordData::A {
                    address: Ipv4Addr::new(203, 0, 113, 9),
                }])
            }
            Behavior::Answer => Ok(Vec::new()),
            Behavior::Timeout => {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Err(ResolveError::UpstreamFailure("timed out".into()))
            }
        }
    }
}

/// A host resolver that knows a single host.
#[derive(Default)]
struct FakeHosts {
    calls: AtomicUsize,
}

impl HostLookup for FakeHosts {
    async fn lookup_ipv4(&self, name: &str) -> io::Result<Vec<Ipv4Addr>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if name == "nas.lan" {
            Ok(vec![Ipv4Addr::new(10, 1, 1, 5)])
        } else {
            Err(io::Error::new(io::ErrorKind::NotFound, "unknown host"))
        }
    }
}

struct Setup {
    store: Arc<Store>,
    upstream: Arc<FakeUpstream>,
    hosts: Arc<FakeHosts>,
    engine: Engine<Shared<FakeUpstream>, Shared<FakeHosts>>,
}

/// Gives the engine a handle to a stand-in the test can still inspect.
struct Shared<T>(Arc<T>);

impl<T: Upstream> Upstream for Shared<T> {
    async fn query(
        &self,
        name: &str,
        rtype: RecordType,
    ) -> Result<Vec<RecordData>, ResolveError> {
        self.0.query(name, rtype).await
    }
}

impl<T: HostLookup> HostLookup for Shared<T> {
    async fn lookup_ipv4(&self, name: &str) -> io::Result<Vec<Ipv4Addr>> {
        self.0.lookup_ipv4(name).await
    }
}

fn config(deny: &[&str]) -> DnsConfig {
    DnsConfig {
        request_log: true,
        local: LocalConfig {
            enabled: true,
            domains: vec!["lan".into()],
        },
        recursion: RecursionConfig {
            enabled: true,
            upstreams: vec!["192.0.2.53".into()],
            deny_recursion: deny.iter().map(|s| s.to_string()).collect(),
        },
        ..Default::default()
    }
}

fn setup(config: DnsConfig, upstream: FakeUpstream) -> Setup {
    let store = Arc::new(Store::memory());
    let upstream = Arc::new(upstream);
    let hosts = Arc::new(FakeHosts::default());
    let engine = Engine::with_parts(
        store.clone(),
        &config,
        LocalResolver::with_hosts(&config.local, Shared(hosts.clone())),
        Forwarder::with_upstream(&config.recursion, Shared(upstream.clone())),
    );
    Setup {
        store,
        upstream,
        hosts,
        engine,
    }
}

fn a_record(zone_id: &Id, name: &str, last: u8) -> Record {
    Record::new(
        zone_id.clone(),
        name,
        300,
        RecordData::A {
            address: Ipv4Addr::new(192, 0, 2, last),
        },
    )
}

//------------ Tests ---------------------------------------------------------

#[tokio::test]
async fn store_answers_without_recursion() {
    let setup = setup(config(&[]), FakeUpstream::default());
    let (zone_id, _) = setup.store.add_zone(Zone::new("example.com")).unwrap();
    setup.store.add_record(a_record(&zone_id, "*.foo", 4)).unwrap();

    let response = setup
        .engine
        .handle(
            &Query::of_type("bar.foo.example.com", RecordType::A),
            Some("192.0.2.100:4000".parse().unwrap()),
        )
        .await;
    assert_eq!(response.outcome, Outcome::Authoritative);
    assert_eq!(response.answers.len(), 1);
    assert_eq!(response.answers[0].name, "bar.foo.example.com");
    assert_eq!(response.answers[0].ttl, 300);
    assert!(response.authorities.is_empty());
    assert_eq!(setup.upstream.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unknown_name_gets_synthesized_soa() {
    let mut config = config(&[]);
    config.recursion.enabled = false;
    let setup = setup(config, FakeUpstream::default());

    let response = setup
        .engine
        .handle(&Query::of_type("nowhere.example", RecordType::Mx), None)
        .await;
    assert_eq!(response.outcome, Outcome::Negative);
    assert!(response.answers.is_empty());
    assert_eq!(response.authorities.len(), 1);
    assert_eq!(response.authorities[0].name, "nowhere.example");
    assert_eq!(response.authorities[0].ttl, 600);
    let soa = response.soa().unwrap();
    assert_eq!(soa.primary, "ns.nowhere.example");
    assert_eq!(soa.admin, "noop.nowhere.example");
    assert_eq!(soa.refresh, 600);
    assert_eq!(soa.retry, 600);
    assert_eq!(soa.expiration, 600);
    assert_eq!(soa.minimum, 600);
    assert!(soa.serial > 0);
    assert_eq!(setup.upstream.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn configured_authority_is_used() {
    let setup = setup(config(&["com"]), FakeUpstream::default());
    let authority = Authority {
        primary: "ns1.example.com".into(),
        admin: "hostmaster.example.com".into(),
        serial: 2024010101,
        refresh: 3600,
        retry: 900,
        expiration: 604800,
        minimum: 120,
    };
    setup
        .store
        .add_zone(Zone::new("example.com").with_authority(authority.clone()))
        .unwrap();

    let response = setup
        .engine
        .handle(&Query::of_type("www.example.com", RecordType::Txt), None)
        .await;
    assert_eq!(response.outcome, Outcome::Negative);
    assert_eq!(response.authorities[0].name, "example.com");
    assert_eq!(response.authorities[0].ttl, 120);
    assert_eq!(response.soa(), Some(&authority));
}

#[tokio::test]
async fn denied_top_label_is_never_forwarded() {
    let setup = setup(config(&["internal"]), FakeUpstream::default());
    let response = setup
        .engine
        .handle(&Query::of_type("db.corp.internal", RecordType::A), None)
        .await;
    assert_eq!(response.outcome, Outcome::Negative);
    assert_eq!(setup.upstream.calls.load(Ordering::SeqCst), 0);

    let response = setup
        .engine
        .handle(&Query::of_type("example.net", RecordType::A), None)
        .await;
    assert_eq!(response.outcome, Outcome::Recursive);
    assert_eq!(setup.upstream.calls.load(Ordering::SeqCst), 1);
    let answer = &response.answers[0];
    assert_eq!(answer.name, "example.net");
    assert_eq!(answer.ttl, 60);
    assert_eq!(
        answer.data,
        ResourceData::Record(RecordData::A {
            address: Ipv4Addr::new(203, 0, 113, 9)
        })
    );
}

#[tokio::test]
async fn empty_upstream_answer_falls_back_to_soa() {
    let setup = setup(config(&[]), FakeUpstream::default());
    let response = setup
        .engine
        .handle(&Query::of_type("example.net", RecordType::Srv), None)
        .await;
    assert_eq!(response.outcome, Outcome::Negative);
    assert_eq!(setup.upstream.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn upstream_timeout_still_answers() {
    let setup = setup(
        config(&[]),
        FakeUpstream {
            behavior: Behavior::Timeout,
            ..Default::default()
        },
    );
    let response = setup
        .engine
        .handle(&Query::of_type("slow.example.net", RecordType::A), None)
        .await;
    assert_eq!(response.outcome, Outcome::Negative);
    assert!(response.answers.is_empty());
    assert_eq!(response.soa().unwrap().primary, "ns.slow.example.net");
    assert_eq!(setup.upstream.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn local_domains_bypass_the_store() {
    let setup = setup(config(&[]), FakeUpstream::default());
    let (zone_id, _) = setup.store.add_zone(Zone::new("lan")).unwrap();
    setup.store.add_record(a_record(&zone_id, "nas", 7)).unwrap();

    let response = setup
        .engine
        .handle(&Query::of_type("nas.lan", RecordType::A), None)
        .await;
    assert_eq!(response.outcome, Outcome::Local);
    assert_eq!(response.answers.len(), 1);
    assert_eq!(response.answers[0].ttl, 600);
    assert_eq!(
        response.answers[0].data,
        ResourceData::Record(RecordData::A {
            address: Ipv4Addr::new(10, 1, 1, 5)
        })
    );

    // A failed host lookup neither consults the store nor recurses.
    let response = setup
        .engine
        .handle(&Query::of_type("gone.lan", RecordType::A), None)
        .await;
    assert_eq!(response.outcome, Outcome::Negative);
    assert_eq!(response.authorities[0].name, "lan");
    assert_eq!(setup.upstream.calls.load(Ordering::SeqCst), 0);

    // Other types go through the store and on upstream.
    let response = setup
        .engine
        .handle(&Query::of_type("nas.lan", RecordType::Mx), None)
        .await;
    assert_eq!(response.outcome, Outcome::Negative);
    assert_eq!(setup.hosts.calls.load(Ordering::SeqCst), 2);
    assert_eq!(setup.upstream.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn store_changes_are_seen_by_later_queries() {
    let mut config = config(&[]);
    config.recursion.enabled = false;
    let setup = setup(config, FakeUpstream::default());
    let query = Query::of_type("www.example.org", RecordType::A);

    let (zone_id, _) = setup.store.add_zone(Zone::new("example.org")).unwrap();
    let response = setup.engine.handle(&query, None).await;
    assert_eq!(response.outcome, Outcome::Negative);

    setup.store.add_record(a_record(&zone_id, "www", 1)).unwrap();
    let response = setup.engine.handle(&query, None).await;
    assert_eq!(response.outcome, Outcome::Authoritative);

    setup.store.delete_zone(&zone_id).unwrap();
    let response = setup.engine.handle(&query, None).await;
    assert_eq!(response.outcome, Outcome::Negative);
    assert_eq!(response.authorities[0].name, "www.example.org");
}

#[tokio::test]
async fn wire_round_trip() {
    let setup = setup(config(&[]), FakeUpstream::default());
    let (zone_id, _) = setup.store.add_zone(Zone::new("example.com")).unwrap();
    setup.store.add_record(a_record(&zone_id, "www", 1)).unwrap();
    setup.store.add_record(a_record(&zone_id, "www", 2)).unwrap();

    let mut builder = MessageBuilder::new_vec().question();
    builder
        .push((
            Name::<Vec<u8>>::from_str("www.example.com").unwrap(),
            Rtype::from_int(RecordType::A.code()),
        ))
        .unwrap();
    let request = builder.into_message();

    let query = wire::parse_query(&request).unwrap();
    let response = setup.engine.handle(&query, None).await;
    let bytes = wire::compose_response(
        &request,
        &response,
        setup.engine.recursion_available(),
    )
    .unwrap();
    let msg = Message::from_octets(bytes).unwrap();
    assert_eq!(msg.header().rcode(), Rcode::NOERROR);
    assert!(msg.header().aa());
    assert!(msg.header().ra());

    let mut addrs: Vec<_> = msg
        .answer()
        .unwrap()
        .limit_to::<A>()
        .map(|record| record.unwrap().data().addr())
        .collect();
    addrs.sort();
    assert_eq!(
        addrs,
        [Ipv4Addr::new(192, 0, 2, 1), Ipv4Addr::new(192, 0, 2, 2)]
    );

    // And the negative case carries the SOA in the authority section.
    let mut builder = MessageBuilder::new_vec().question();
    builder
        .push((
            Name::<Vec<u8>>::from_str("none.example.com").unwrap(),
            Rtype::from_int(RecordType::Txt.code()),
        ))
        .unwrap();
    let request = builder.into_message();
    let response = setup
        .engine
        .handle(&wire::parse_query(&request).unwrap(), None)
        .await;
    let bytes = wire::compose_response(&request, &response, true).unwrap();
    let msg = Message::from_octets(bytes).unwrap();
    assert_eq!(msg.header_counts().ancount(), 0);
    let soa = msg
        .authority()
        .unwrap()
        .limit_to::<Soa<ParsedName<_>>>()
        .next()
        .unwrap()
        .unwrap();
    assert_eq!(soa.owner().to_string(), "example.com");
    assert_eq!(soa.data().mname().to_string(), "ns.example.com");
}

use std::net::TcpListener;
use std::thread;

use ot_bench::engine::{CotEngine, EngineParams, Variant};
use ot_bench::socket_channel::{open_channels, TcpChannel};
use ot_bench::{run_party, BenchError, BenchmarkOrchestrator, InstrumentedChannel, Party, RunConfig, RunReport};

type TcpOrchestrator = BenchmarkOrchestrator<TcpChannel, CotEngine<InstrumentedChannel<TcpChannel>>>;

/// A base port whose successor is also free right now.
fn free_port_pair() -> u16 {
    loop {
        let first = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = first.local_addr().unwrap().port();
        if port < u16::MAX && TcpListener::bind(("127.0.0.1", port + 1)).is_ok() {
            return port;
        }
    }
}

fn run(party: Party, port: u16, malicious: bool) -> RunReport {
    let channels = open_channels(party, "127.0.0.1", port, 2, true).unwrap();
    let params = EngineParams::new(2, malicious, Variant::Regular).with_ot_limit(1024);
    TcpOrchestrator::new(party, channels, params, 3000)
        .with_verification(true)
        .run()
        .unwrap()
}

#[test]
fn two_parties_over_loopback() {
    let port = free_port_pair();
    let initiator = thread::spawn(move || run(Party::Initiator, port, true));
    let bob = run(Party::Responder, port, true);
    let alice = initiator.join().unwrap();

    assert_eq!(alice.send_digest, bob.recv_digest);
    assert_eq!(alice.recv_digest, bob.send_digest);
    assert_eq!(alice.bytes_sent, bob.bytes_received);
    assert_eq!(alice.bytes_received, bob.bytes_sent);
    assert_eq!(alice.phase("rcot").unwrap().count, Some(3000));

    let lines = alice.text_lines();
    assert!(lines.iter().any(|l| l.starts_with("party=1\tphase=rcot\t")));
    assert!(lines.last().unwrap().contains("send_digest="));
}

#[test]
fn semi_honest_sends_less() {
    let port = free_port_pair();
    let initiator = thread::spawn(move || run(Party::Initiator, port, false));
    let semi = run(Party::Responder, port, false);
    initiator.join().unwrap();

    let port = free_port_pair();
    let initiator = thread::spawn(move || run(Party::Initiator, port, true));
    let malicious = run(Party::Responder, port, true);
    initiator.join().unwrap();

    assert!(semi.bytes_sent < malicious.bytes_sent);
}

#[test]
fn guard_rejects_before_connecting() {
    let mut config = RunConfig::new(Party::Responder, free_port_pair());
    config.log2 = 31;
    match run_party(&config) {
        Err(BenchError::Configuration(msg)) => assert!(msg.contains("Large test size")),
        other => panic!("expected a configuration error, got {:?}", other.map(|r| r.party)),
    }

    config.log2 = 24;
    assert!(config.validate().is_ok());
}

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use libpcap_layers::{
    DecodedPacket, Decoder, DissectorRegistry, Layer, LayerSerializer, LayerType, LinkType,
};
use libpcap_script::*;

const ARP_FRAME: &[u8] = b"\xff\xff\xff\xff\xff\xff\x00\x11\x22\x33\x44\x55\x08\x06\
    \x00\x01\x08\x00\x06\x04\x00\x01\x00\x11\x22\x33\x44\x55\xc0\xa8\x01\x01\
    \x00\x00\x00\x00\x00\x00\xc0\xa8\x01\x02";

const TCP_FRAME: &[u8] = b"\x66\x77\x88\x99\xaa\xbb\x00\x11\x22\x33\x44\x55\x08\x00\
    \x45\x00\x00\x2c\x00\x01\x40\x00\x40\x06\x00\x00\xc0\xa8\x01\x01\xc0\xa8\x01\x02\
    \x30\x39\x00\x50\x00\x00\x00\x01\x00\x00\x00\x00\x50\x02\x72\x10\x00\x00\x00\x00\
    GET ";

/// In-memory capture source
struct VecSource {
    link_type: LinkType,
    packets: VecDeque<Packet>,
    dropped: Rc<Cell<bool>>,
}

impl VecSource {
    fn new(frames: &[&[u8]]) -> (Self, Rc<Cell<bool>>) {
        let packets = frames
            .iter()
            .enumerate()
            .map(|(i, f)| {
                let meta = PacketMeta {
                    index: i + 1,
                    ts: Duration::new(1_600_000_000 + i as u32, 0),
                    link_type: LinkType::Ethernet,
                    caplen: f.len() as u32,
                    origlen: f.len() as u32,
                };
                Packet::new(meta, f.to_vec())
            })
            .collect();
        let dropped = Rc::new(Cell::new(false));
        let source = VecSource {
            link_type: LinkType::Ethernet,
            packets,
            dropped: dropped.clone(),
        };
        (source, dropped)
    }
}

impl CaptureSource for VecSource {
    fn link_type(&self) -> LinkType {
        self.link_type
    }

    fn next_packet(&mut self) -> Result<Option<Packet>, Error> {
        Ok(self.packets.pop_front())
    }
}

impl Drop for VecSource {
    fn drop(&mut self) {
        self.dropped.set(true);
    }
}

struct Harness {
    eval: EvaluationLoop,
    output: Rc<RefCell<Vec<String>>>,
    dropped: Rc<Cell<bool>>,
}

fn harness(frames: &[&[u8]], setup: Option<&str>, rule: Option<&str>) -> Harness {
    let context = PacketContext::new_shared();
    let mut engine = ScriptEngine::new(context);
    let output = Rc::new(RefCell::new(Vec::new()));
    let out = output.clone();
    engine.set_printer(Rc::new(move |s: &str| out.borrow_mut().push(s.to_owned())));
    engine.initialize().expect("initialize");
    if let Some(setup) = setup {
        engine.run_setup(setup).expect("setup script");
    }
    let rule = engine.compile_rule(rule).expect("rule script");
    let (source, dropped) = VecSource::new(frames);
    let eval = EvaluationLoop::new(Box::new(source), engine, rule);
    Harness {
        eval,
        output,
        dropped,
    }
}

#[test]
fn pretty_dump_of_arp_only() {
    let h = harness(
        &[ARP_FRAME, TCP_FRAME],
        None,
        Some(r#"if containsLayer("ARP") { print(prettyPacket()); }"#),
    );
    let stats = h.eval.run().expect("run");
    assert_eq!(stats.packets, 2);
    let output = h.output.borrow();
    assert_eq!(output.len(), 1);
    assert!(output[0].starts_with("PACKET: 42 bytes"));
    assert!(output[0].contains("= ARP\t"));
    assert!(h.dropped.get());
}

#[test]
fn setup_global_visible_on_first_packet() {
    let h = harness(
        &[TCP_FRAME, ARP_FRAME],
        Some(r#"let greeting = "hello"; let count = 0;"#),
        Some(r#"count += 1; print(greeting + " " + count + " " + packet[packet.len() - 1].name);"#),
    );
    h.eval.run().expect("run");
    assert_eq!(
        *h.output.borrow(),
        vec!["hello 1 Payload", "hello 2 ARP"]
    );
}

#[test]
fn failing_rule_stops_processing() {
    let h = harness(
        &[ARP_FRAME, TCP_FRAME],
        None,
        Some(r#"if containsLayer("ARP") { throw "no ARP allowed"; } print("seen");"#),
    );
    match h.eval.run() {
        Err(Error::Script(ScriptError::Runtime(msg))) => assert!(msg.contains("no ARP allowed")),
        other => panic!("unexpected result {other:?}"),
    }
    assert!(h.output.borrow().is_empty());
    assert!(h.dropped.get());
}

#[test]
fn skip_policy_continues() {
    let h = harness(
        &[ARP_FRAME, TCP_FRAME],
        None,
        Some(r#"if containsLayer("ARP") { throw "no ARP allowed"; } print("seen");"#),
    );
    let stats = h.eval.with_policy(ErrorPolicy::Skip).run().expect("run");
    assert_eq!(stats.packets, 2);
    assert_eq!(stats.script_errors, 1);
    assert_eq!(*h.output.borrow(), vec!["seen"]);
}

#[test]
fn policy_from_config() {
    let mut config = Config::default();
    config.set("script.on_error", "skip").expect("set");
    let h = harness(&[ARP_FRAME], None, Some(r#"throw "x";"#));
    let stats = h.eval.configure(&config).expect("configure").run().expect("run");
    assert_eq!(stats.script_errors, 1);

    config.set("script.on_error", "sometimes").expect("set");
    let h = harness(&[ARP_FRAME], None, None);
    assert!(matches!(h.eval.configure(&config), Err(Error::Config(_))));
}

#[test]
fn truncated_packet_forwards_prefix() {
    let h = harness(
        &[&TCP_FRAME[..44]],
        None,
        Some(r#"print(packet.len()); print(packet[1].info.SrcIP);"#),
    );
    let stats = h.eval.run().expect("run");
    assert_eq!(stats.decode_errors, 1);
    assert_eq!(*h.output.borrow(), vec!["2", "192.168.1.1"]);
}

#[test]
fn link_type_override() {
    // an IPv4 datagram, announced as Ethernet by the source
    let h = harness(
        &[&TCP_FRAME[14..]],
        None,
        Some(r#"print(packet[0].name);"#),
    );
    h.eval.with_link_type(Some(LinkType::Raw)).run().expect("run");
    assert_eq!(*h.output.borrow(), vec!["IPv4"]);
}

#[test]
fn default_rule_prints_json() {
    let h = harness(&[ARP_FRAME, TCP_FRAME], None, None);
    h.eval.run().expect("run");
    let output = h.output.borrow();
    assert_eq!(output.len(), 2);
    let v: serde_json::Value = serde_json::from_str(&output[1]).expect("json");
    let names: Vec<_> = v
        .as_array()
        .expect("array")
        .iter()
        .map(|l| l["name"].as_str().unwrap_or_default().to_owned())
        .collect();
    assert_eq!(names, vec!["Ethernet", "IPv4", "TCP", "Payload"]);
    assert_eq!(v[2]["info"]["DstPort"], 80);
}

#[test]
fn stopped_before_start() {
    let h = harness(&[ARP_FRAME, TCP_FRAME], None, None);
    let running = Arc::new(AtomicBool::new(true));
    running.store(false, Ordering::SeqCst);
    let stats = h.eval.with_running_flag(running).run().expect("run");
    assert_eq!(stats.packets, 0);
    assert!(h.output.borrow().is_empty());
    assert!(h.dropped.get());
}

/// Decoder exposing the whole frame as a single payload layer
struct OpaqueDecoder;

impl Decoder for OpaqueDecoder {
    fn decode(&self, _link_type: LinkType, data: &[u8]) -> DecodedPacket {
        DecodedPacket {
            layers: vec![Layer::new(LayerType::Payload, data, &[])],
            error: None,
        }
    }
}

#[test]
fn custom_decoder() {
    let h = harness(
        &[ARP_FRAME, TCP_FRAME],
        None,
        Some(r#"print(packet.len() + " " + packet[0].name + " " + containsLayer("ARP"));"#),
    );
    h.eval
        .with_decoder(Box::new(OpaqueDecoder))
        .run()
        .expect("run");
    assert_eq!(
        *h.output.borrow(),
        vec!["1 Payload false", "1 Payload false"]
    );
}

#[test]
fn custom_serializer() {
    let h = harness(&[ARP_FRAME], None, Some(r#"print(packet[1].info.len());"#));
    h.eval
        .with_serializer(LayerSerializer::new(DissectorRegistry::new()))
        .run()
        .expect("run");
    // only Contents and Payload without dissectors
    assert_eq!(*h.output.borrow(), vec!["2"]);
}

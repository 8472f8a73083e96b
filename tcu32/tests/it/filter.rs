use bytes::Bytes;
use rtnetlink::packet_core::{NetlinkMessage, NetlinkPayload, Nla as _};
use rtnetlink::packet_route::{
    RouteNetlinkMessage,
    tc::{TcAttribute, TcHandle},
};

use tcu32::filter::{ETH_P_IP, TCA_OPTIONS};
use tcu32::{CanonicalKey, FilterRequestInner, U32FilterRequest, U32Option, U32Options};

/// Pulls the decoded `TCA_OPTIONS` out of a filter request.
fn options_of(nl_req: NetlinkMessage<RouteNetlinkMessage>) -> U32Options {
    let NetlinkPayload::InnerMessage(RouteNetlinkMessage::NewTrafficFilter(msg)) = nl_req.payload
    else {
        panic!("expected a new traffic filter message");
    };

    let nla = msg
        .attributes
        .iter()
        .find_map(|attr| match attr {
            TcAttribute::Other(nla) if nla.kind() == TCA_OPTIONS => Some(nla),
            _ => None,
        })
        .expect("options attribute");

    let mut payload = vec![0u8; nla.value_len()];
    nla.emit_value(&mut payload);

    U32Options::decode(payload).unwrap()
}

#[test]
fn tcp_to_host_filter() {
    let _ = tracing_subscriber::fmt::try_init();

    let request = U32FilterRequest::new(
        FilterRequestInner::new(4).with_parent(TcHandle::from(0x0001_0000)),
        0x0001_000c,
        ["0x0006/0x00ff+8", "0x0000/0xffc0+2", "0x5/0xf+0", "0x10/0xff+33"],
    )
    .with_protocol(ETH_P_IP)
    .with_priority(1);

    let options = options_of(request.build().unwrap());

    let kinds: Vec<_> = options.iter().map(U32Option::kind).collect();
    assert_eq!(kinds, vec![1, 5]);
    assert_eq!(options.class_id(), Some(0x0001_000c));

    let sel = options.selector().unwrap();
    assert_eq!(sel.flags, tcu32_sel::TC_U32_TERMINAL);
    assert_eq!(
        sel.keys(),
        &[
            CanonicalKey::new(0x00ff_0000, 0x0006_0000, 8),
            CanonicalKey::new(0x0f00_ffc0, 0x0500_0000, 0),
            CanonicalKey::new(0x00ff_0000, 0x0010_0000, 32),
        ]
    );
}

#[test]
fn policer_passes_through_verbatim() {
    let police = Bytes::from_static(&[8, 0, 2, 0, 0x10, 0x27, 0, 0]);
    let request = U32FilterRequest::new(FilterRequestInner::new(4), 0x0001_0001, ["0x0/0x0+0"])
        .with_police(police.clone());

    let options = options_of(request.build().unwrap());

    assert_eq!(options.0[0], U32Option::Police(police));
    assert_eq!(options.selector().unwrap().keys(), &[CanonicalKey::new(0, 0, 0)]);
}

#[test]
fn invalid_keys_produce_no_message() {
    let request =
        U32FilterRequest::new(FilterRequestInner::new(4), 0x0001_0001, ["notanumber/0xff+0"]);

    let err = request.build().unwrap_err();
    assert!(matches!(err, tcu32::Error::Selector(tcu32_sel::Error::InvalidKeySpec { .. })));
    assert_eq!(err.to_string(), "invalid value in key specification \"notanumber/0xff+0\"");
}

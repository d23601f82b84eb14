//! End-to-end tests of the RSL dispatcher against an in-memory backend
//! that records every collaborator call.

use abis_rsl::wire::ie::{act_type, tag};
use abis_rsl::wire::tlv::TlvReader;
use abis_rsl::{
    Bts, BtsConfig, Cause, ChanNr, GsmTime, Lapdm, LchanId, LchanState, Pchan, Phy, Pcu,
    RelActKind, RslMsg, RtpBackend, RtpHandle, RtpStats, TsFlags,
};

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
enum PhyCall {
    TsConnect(u8, u8, Pchan),
    TsDisconnect(u8, u8),
    Activate(LchanId),
    Deactivate(LchanId),
    Modify(LchanId),
    SacchDeactivate(LchanId),
    AdjustMsPower(LchanId, u8),
}

#[derive(Default)]
struct Fake {
    sent: Vec<Vec<u8>>,
    phy: Vec<PhyCall>,
    lapdm_rx: Vec<(LchanId, Vec<u8>)>,
    lapdm_released: Vec<LchanId>,
    pcu_up: bool,
    pcu_info_inds: usize,
    pag_reqs: Vec<(Vec<u8>, u8)>,
    paged: Vec<(u8, Vec<u8>, u8)>,
    smscb: Vec<(u8, Vec<u8>)>,
    si_changes: usize,
    frame_number: u32,
    // RTP pool
    next_sock: u32,
    open_socks: Vec<u32>,
    bound: std::collections::HashMap<u32, (u32, u16)>,
    create_fails: bool,
    bind_fails: bool,
    connect_fails: bool,
    stats: RtpStats,
    rsl_local: Option<u32>,
    rsl_peer: u32,
}

impl Phy for Fake {
    fn ts_connect(&mut self, trx: u8, tn: u8, as_pchan: Pchan) -> Result<(), Cause> {
        self.phy.push(PhyCall::TsConnect(trx, tn, as_pchan));
        Ok(())
    }
    fn ts_disconnect(&mut self, trx: u8, tn: u8) -> Result<(), Cause> {
        self.phy.push(PhyCall::TsDisconnect(trx, tn));
        Ok(())
    }
    fn lchan_activate(&mut self, id: LchanId, _lchan: &abis_rsl::Lchan) -> Result<(), Cause> {
        self.phy.push(PhyCall::Activate(id));
        Ok(())
    }
    fn lchan_deactivate(&mut self, id: LchanId) -> Result<(), Cause> {
        self.phy.push(PhyCall::Deactivate(id));
        Ok(())
    }
    fn lchan_modify(&mut self, id: LchanId, _lchan: &abis_rsl::Lchan) -> Result<(), Cause> {
        self.phy.push(PhyCall::Modify(id));
        Ok(())
    }
    fn sacch_deactivate(&mut self, id: LchanId) -> Result<(), Cause> {
        self.phy.push(PhyCall::SacchDeactivate(id));
        Ok(())
    }
    fn adjust_ms_power(&mut self, id: LchanId, lchan: &abis_rsl::Lchan) {
        self.phy
            .push(PhyCall::AdjustMsPower(id, lchan.ms_power_ctrl.current));
    }
}

impl Pcu for Fake {
    fn connected(&self) -> bool {
        self.pcu_up
    }
    fn tx_info_ind(&mut self) -> Result<(), ()> {
        self.pcu_info_inds += 1;
        Ok(())
    }
    fn tx_pag_req(&mut self, identity_lv: &[u8], chan_needed: u8) {
        self.pag_reqs.push((identity_lv.to_vec(), chan_needed));
    }
}

impl Lapdm for Fake {
    fn submit(&mut self, id: LchanId, msg: RslMsg) {
        self.lapdm_rx.push((id, msg.as_slice().to_vec()));
    }
    fn release(&mut self, id: LchanId) {
        self.lapdm_released.push(id);
    }
}

impl RtpBackend for Fake {
    fn create(&mut self, _owner: LchanId) -> Option<RtpHandle> {
        if self.create_fails {
            return None;
        }
        self.next_sock += 1;
        self.open_socks.push(self.next_sock);
        Some(RtpHandle(self.next_sock))
    }
    fn set_jitter(&mut self, _sock: RtpHandle, _adaptive: bool, _buf_ms: u16) -> Result<(), ()> {
        Ok(())
    }
    fn bind(&mut self, sock: RtpHandle, local_ip: u32) -> Result<(), ()> {
        if self.bind_fails {
            return Err(());
        }
        self.bound.insert(sock.0, (local_ip, 16384 + sock.0 as u16));
        Ok(())
    }
    fn connect(&mut self, sock: RtpHandle, _remote_ip: u32, _remote_port: u16) -> Result<(), ()> {
        if self.connect_fails {
            return Err(());
        }
        // the kernel picks the local address on connect()
        if let Some(bound) = self.bound.get_mut(&sock.0) {
            if bound.0 == 0 {
                bound.0 = 0x0a000001;
            }
        }
        Ok(())
    }
    fn set_payload_type(&mut self, _sock: RtpHandle, _pt: u8) {}
    fn bound_ip_port(&self, sock: RtpHandle) -> (u32, u16) {
        self.bound.get(&sock.0).copied().unwrap_or((0, 0))
    }
    fn stats(&self, _sock: RtpHandle) -> RtpStats {
        self.stats
    }
    fn close(&mut self, sock: RtpHandle) {
        self.open_socks.retain(|&s| s != sock.0);
    }
    fn rsl_local_ip(&self, _trx: u8) -> Option<u32> {
        self.rsl_local
    }
    fn rsl_peer_ip(&self, _trx: u8) -> u32 {
        self.rsl_peer
    }
}

impl abis_rsl::Abis for Fake {
    fn send(&mut self, _trx: u8, msg: RslMsg) {
        self.sent.push(msg.as_slice().to_vec());
    }
    fn gsm_time(&self) -> GsmTime {
        GsmTime::from_fn(self.frame_number)
    }
    fn paging_add_identity(
        &mut self,
        paging_group: u8,
        identity_lv: &[u8],
        chan_needed: u8,
    ) -> Result<(), ()> {
        self.paged
            .push((paging_group, identity_lv.to_vec(), chan_needed));
        Ok(())
    }
    fn smscb_command(&mut self, cmd_type: u8, msg: &[u8]) {
        self.smscb.push((cmd_type, msg.to_vec()));
    }
    fn new_sysinfo(&mut self) {
        self.si_changes += 1;
    }
}

/// Inbound message builder mirroring the BSC side of the framing.
struct Inbound(Vec<u8>);

impl Inbound {
    fn cchan(mt: u8, chan_nr: u8) -> Inbound {
        Inbound(vec![0x0c, mt, tag::CHAN_NR, chan_nr])
    }
    fn dchan(mt: u8, chan_nr: u8) -> Inbound {
        Inbound(vec![0x08, mt, tag::CHAN_NR, chan_nr])
    }
    fn trx(mt: u8) -> Inbound {
        Inbound(vec![0x10, mt])
    }
    fn ipac(mt: u8, chan_nr: u8) -> Inbound {
        Inbound(vec![0x7e, mt, tag::CHAN_NR, chan_nr])
    }
    fn tv(mut self, t: u8, v: u8) -> Inbound {
        self.0.extend_from_slice(&[t, v]);
        self
    }
    fn tv_fixed(mut self, t: u8, v: &[u8]) -> Inbound {
        self.0.push(t);
        self.0.extend_from_slice(v);
        self
    }
    fn tlv(mut self, t: u8, v: &[u8]) -> Inbound {
        self.0.push(t);
        self.0.push(v.len() as u8);
        self.0.extend_from_slice(v);
        self
    }
    fn tl16v(mut self, t: u8, v: &[u8]) -> Inbound {
        self.0.push(t);
        self.0.extend_from_slice(&(v.len() as u16).to_be_bytes());
        self.0.extend_from_slice(v);
        self
    }
    fn build(self) -> RslMsg {
        RslMsg::from_slice(&self.0).unwrap()
    }
}

fn msg_type(frame: &[u8]) -> u8 {
    frame[1]
}

/// IE payload offset for a frame of the given discriminator.
fn l3_of(frame: &[u8]) -> &[u8] {
    match frame[0] & 0xfe {
        0x10 => &frame[2..],
        _ => &frame[4..],
    }
}

fn find_ie(frame: &[u8], t: u8) -> Option<Vec<u8>> {
    TlvReader::find(l3_of(frame), t).map(|v| v.to_vec())
}

fn cause_of(frame: &[u8]) -> u8 {
    find_ie(frame, tag::CAUSE).expect("cause IE")[0]
}

fn bts_with(pchan: Pchan, tn: u8) -> Bts {
    let mut bts = Bts::new(BtsConfig::default());
    bts.configure_ts(0, 0, Pchan::CcchSdcch4);
    if tn != 0 {
        bts.configure_ts(0, tn, pchan);
    }
    bts
}

fn chan_mode_v1() -> [u8; 4] {
    [0x00, 0x01, 0x08, 0x01]
}

const TCH_ID: LchanId = LchanId { trx: 0, tn: 1, ss: 0 };

fn activate_tch(bts: &mut Bts, fake: &mut Fake) {
    let msg = Inbound::dchan(0x21, ChanNr::tch_f(1).0)
        .tv(tag::ACT_TYPE, act_type::INTRA_NORM_ASS)
        .tlv(tag::CHAN_MODE, &chan_mode_v1())
        .tv(tag::MS_POWER, 0x05)
        .tv(tag::TIMING_ADVANCE, 0x02)
        .build();
    bts.rsl_rx(fake, 0, msg).unwrap();
    assert_eq!(fake.phy.last(), Some(&PhyCall::Activate(TCH_ID)));
    bts.lchan_act_confirm(fake, TCH_ID, Ok(()));
}

#[test]
fn s1_plain_channel_activation() {
    let mut bts = bts_with(Pchan::TchF, 1);
    let mut fake = Fake {
        frame_number: 26 * 51 * 5 + 17,
        ..Fake::default()
    };

    activate_tch(&mut bts, &mut fake);

    let lchan = bts.lchan(TCH_ID).unwrap();
    assert_eq!(lchan.state, LchanState::Active);
    assert_eq!(lchan.ms_power, 0x05);
    assert_eq!(lchan.rqd_ta, 0x02);

    let ack = fake.sent.last().unwrap();
    assert_eq!(msg_type(ack), 0x22);
    let fn_ie = find_ie(ack, tag::FRAME_NUMBER).unwrap();
    let expect = GsmTime::from_fn(fake.frame_number).starting_time();
    assert_eq!(fn_ie, expect);
}

#[test]
fn s2_missing_activation_type_nacks() {
    let mut bts = bts_with(Pchan::TchF, 1);
    let mut fake = Fake::default();

    let msg = Inbound::dchan(0x21, ChanNr::tch_f(1).0)
        .tlv(tag::CHAN_MODE, &chan_mode_v1())
        .build();
    bts.rsl_rx(&mut fake, 0, msg).unwrap();

    let nack = fake.sent.last().unwrap();
    assert_eq!(msg_type(nack), 0x23);
    assert_eq!(cause_of(nack), Cause::MAND_IE_ERROR.0);
    assert_eq!(bts.lchan(TCH_ID).unwrap().state, LchanState::None);
    assert!(fake.phy.is_empty());
}

#[test]
fn s3_crcx_mdcx_dlcx_happy_path() {
    let mut bts = bts_with(Pchan::TchF, 1);
    let mut fake = Fake {
        rsl_peer: 0xc0000201,
        stats: RtpStats {
            packets_sent: 7,
            octets_sent: 231,
            ..RtpStats::default()
        },
        ..Fake::default()
    };

    // CRCX with remote 192.0.2.5:16000, payload 98
    let msg = Inbound::ipac(0x70, ChanNr::tch_f(1).0)
        .tv_fixed(tag::IPAC_REMOTE_IP, &0xc0000205u32.to_be_bytes())
        .tv_fixed(tag::IPAC_REMOTE_PORT, &16000u16.to_be_bytes())
        .tv(tag::IPAC_RTP_PAYLOAD, 98)
        .build();
    bts.rsl_rx(&mut fake, 0, msg).unwrap();

    let ack = fake.sent.last().unwrap().clone();
    assert_eq!(msg_type(&ack), 0x71);
    assert!(find_ie(&ack, tag::IPAC_CONN_ID).is_some());
    let local_ip = find_ie(&ack, tag::IPAC_LOCAL_IP).unwrap();
    assert_eq!(local_ip, 0x0a000001u32.to_be_bytes());
    let local_port = find_ie(&ack, tag::IPAC_LOCAL_PORT).unwrap();
    assert!(u16::from_be_bytes([local_port[0], local_port[1]]) > 0);
    assert!(find_ie(&ack, tag::IPAC_RTP_PAYLOAD2).is_none());
    let ep = bts.lchan(TCH_ID).unwrap().rtp.unwrap();
    assert_eq!(ep.connect_ip, 0xc0000205);
    assert_eq!(ep.connect_port, 16000);
    assert_eq!(ep.rtp_payload, 98);

    // MDCX to 192.0.2.6:16002
    let msg = Inbound::ipac(0x73, ChanNr::tch_f(1).0)
        .tv_fixed(tag::IPAC_REMOTE_IP, &0xc0000206u32.to_be_bytes())
        .tv_fixed(tag::IPAC_REMOTE_PORT, &16002u16.to_be_bytes())
        .build();
    bts.rsl_rx(&mut fake, 0, msg).unwrap();
    assert_eq!(msg_type(fake.sent.last().unwrap()), 0x74);
    assert_eq!(bts.lchan(TCH_ID).unwrap().rtp.unwrap().connect_port, 16002);

    // DLCX with connection id: stats block in the ACK, socket gone
    let msg = Inbound::ipac(0x77, ChanNr::tch_f(1).0)
        .tv_fixed(tag::IPAC_CONN_ID, &0u16.to_be_bytes())
        .build();
    bts.rsl_rx(&mut fake, 0, msg).unwrap();
    let ack = fake.sent.last().unwrap();
    assert_eq!(msg_type(ack), 0x78);
    let stats = find_ie(ack, tag::IPAC_CONN_STAT).unwrap();
    assert_eq!(stats.len(), 28);
    assert_eq!(&stats[0..4], &7u32.to_be_bytes());
    assert!(bts.lchan(TCH_ID).unwrap().rtp.is_none());
    assert!(fake.open_socks.is_empty());
}

#[test]
fn s4_pdch_act_without_pcu() {
    let mut bts = bts_with(Pchan::TchFPdch, 3);
    let mut fake = Fake::default();
    let chan_nr = ChanNr::tch_f(3);

    bts.rsl_rx(&mut fake, 0, Inbound::dchan(0x48, chan_nr.0).build())
        .unwrap();
    assert_eq!(fake.phy.last(), Some(&PhyCall::TsDisconnect(0, 3)));

    bts.ts_disconnected(&mut fake, 0, 3);
    assert_eq!(fake.phy.last(), Some(&PhyCall::TsConnect(0, 3, Pchan::Pdch)));

    bts.ts_connected(&mut fake, 0, 3);
    let ack = fake.sent.last().unwrap();
    assert_eq!(msg_type(ack), 0x49);
    let ts = bts.ts(0, 3).unwrap();
    assert!(ts.flags.contains(TsFlags::PDCH_ACTIVE));
    assert!(!ts.flags.intersects(TsFlags::PDCH_PENDING_MASK));
    assert_eq!(fake.pcu_info_inds, 0);
}

#[test]
fn property3_pdch_act_then_deact_clears_flags() {
    let mut bts = bts_with(Pchan::TchFPdch, 3);
    let mut fake = Fake::default();
    let chan_nr = ChanNr::tch_f(3);

    bts.rsl_rx(&mut fake, 0, Inbound::dchan(0x48, chan_nr.0).build())
        .unwrap();
    bts.ts_disconnected(&mut fake, 0, 3);
    bts.ts_connected(&mut fake, 0, 3);
    assert!(bts.ts(0, 3).unwrap().flags.contains(TsFlags::PDCH_ACTIVE));

    bts.rsl_rx(&mut fake, 0, Inbound::dchan(0x4b, chan_nr.0).build())
        .unwrap();
    // no PCU: straight to the PHY
    assert_eq!(fake.phy.last(), Some(&PhyCall::TsDisconnect(0, 3)));
    bts.ts_disconnected(&mut fake, 0, 3);
    assert_eq!(fake.phy.last(), Some(&PhyCall::TsConnect(0, 3, Pchan::TchF)));
    bts.ts_connected(&mut fake, 0, 3);

    assert_eq!(msg_type(fake.sent.last().unwrap()), 0x4c);
    let ts = bts.ts(0, 3).unwrap();
    assert!(ts.flags.is_empty());
}

#[test]
fn s5_three_way_dynamic_reactivation() {
    let mut bts = bts_with(Pchan::TchFTchHPdch, 4);
    let mut fake = Fake::default();
    {
        let ts = bts.ts_mut(0, 4).unwrap();
        ts.dynamic.pchan_is = Pchan::TchF;
        ts.configure_lchans_for(Pchan::TchF);
    }

    let chan_nr = ChanNr::tch_h(4, 0);
    let msg = Inbound::dchan(0x21, chan_nr.0)
        .tv(tag::ACT_TYPE, act_type::INTRA_NORM_ASS)
        .tlv(tag::CHAN_MODE, &chan_mode_v1())
        .build();
    bts.rsl_rx(&mut fake, 0, msg).unwrap();

    // parked, not answered, PHY asked to disconnect
    assert!(fake.sent.is_empty());
    assert_eq!(fake.phy.last(), Some(&PhyCall::TsDisconnect(0, 4)));
    assert!(bts.ts(0, 4).unwrap().dynamic.pending_chan_activ.is_some());

    bts.ts_disconnected(&mut fake, 0, 4);
    assert_eq!(fake.phy.last(), Some(&PhyCall::TsConnect(0, 4, Pchan::TchH)));

    bts.ts_connected(&mut fake, 0, 4);
    let id = LchanId { trx: 0, tn: 4, ss: 0 };
    assert!(bts.ts(0, 4).unwrap().dynamic.pending_chan_activ.is_none());
    assert_eq!(bts.ts(0, 4).unwrap().dynamic.pchan_is, Pchan::TchH);
    assert_eq!(fake.phy.last(), Some(&PhyCall::Activate(id)));

    bts.lchan_act_confirm(&mut fake, id, Ok(()));
    assert_eq!(msg_type(fake.sent.last().unwrap()), 0x22);
}

#[test]
fn s6_bcch_info_store() {
    let mut bts = bts_with(Pchan::CcchSdcch4, 0);
    let mut fake = Fake::default();

    let mut si3 = [0x49u8; 21];
    si3[10] = 1 << 3; // one AGCH block reserved
    let msg = Inbound::cchan(0x11, ChanNr::bcch().0)
        .tv(tag::SYSINFO_TYPE, 0x03)
        .tlv(tag::FULL_BCCH_INFO, &si3)
        .build();
    bts.rsl_rx(&mut fake, 0, msg).unwrap();

    let buf = bts.si.get(abis_rsl::wire::ie::SiType::Si3).unwrap();
    assert_eq!(&buf[..21], &si3);
    assert_eq!(&buf[21..], &[0x2b, 0x2b]);
    assert_eq!(fake.si_changes, 1);
    assert!(fake.sent.is_empty());
    assert!(fake.phy.is_empty());
}

#[test]
fn si3_with_agch_split_recycles_ccch() {
    let mut bts = bts_with(Pchan::CcchSdcch4, 0);
    let mut fake = Fake::default();

    let mut si3 = [0x49u8; 21];
    si3[10] = 2 << 3;
    let msg = Inbound::cchan(0x11, ChanNr::bcch().0)
        .tv(tag::SYSINFO_TYPE, 0x03)
        .tlv(tag::FULL_BCCH_INFO, &si3)
        .build();
    bts.rsl_rx(&mut fake, 0, msg).unwrap();

    let ccch = LchanId { trx: 0, tn: 0, ss: 4 };
    assert_eq!(fake.phy.last(), Some(&PhyCall::Deactivate(ccch)));
    assert_eq!(
        bts.lchan(ccch).unwrap().rel_act_kind,
        RelActKind::Reactivate
    );

    // the release confirm re-activates instead of acking
    bts.lchan_rel_confirm(&mut fake, ccch);
    assert_eq!(fake.phy.last(), Some(&PhyCall::Activate(ccch)));
    assert!(fake.sent.is_empty());
}

#[test]
fn property2_activate_release_cycle_is_clean() {
    let mut bts = bts_with(Pchan::TchF, 1);
    let mut fake = Fake::default();

    activate_tch(&mut bts, &mut fake);
    assert_eq!(bts.lchan(TCH_ID).unwrap().state, LchanState::Active);

    bts.rsl_rx(
        &mut fake,
        0,
        Inbound::dchan(0x2e, ChanNr::tch_f(1).0).build(),
    )
    .unwrap();
    assert_eq!(fake.phy.last(), Some(&PhyCall::Deactivate(TCH_ID)));
    assert_eq!(bts.lchan(TCH_ID).unwrap().state, LchanState::RelReq);

    bts.lchan_rel_confirm(&mut fake, TCH_ID);
    assert_eq!(msg_type(fake.sent.last().unwrap()), 0x33);
    assert_eq!(fake.lapdm_released, vec![TCH_ID]);

    let lchan = bts.lchan(TCH_ID).unwrap();
    assert_eq!(lchan.state, LchanState::None);
    assert_eq!(lchan.rel_act_kind, RelActKind::Rsl);
    assert!(lchan.rtp.is_none());
    assert!(lchan.dl_tch_queue.is_empty());
    assert!(!bts.ts(0, 1).unwrap().flags.intersects(TsFlags::PDCH_PENDING_MASK));
}

#[test]
fn property5_crcx_connect_failure_leaves_no_socket() {
    let mut bts = bts_with(Pchan::TchF, 1);
    let mut fake = Fake {
        connect_fails: true,
        ..Fake::default()
    };
    bts.lchan_mut(TCH_ID)
        .unwrap()
        .dl_tch_queue
        .push_back(heapless::Vec::new())
        .unwrap();

    let msg = Inbound::ipac(0x70, ChanNr::tch_f(1).0)
        .tv_fixed(tag::IPAC_REMOTE_IP, &0xc0000205u32.to_be_bytes())
        .tv_fixed(tag::IPAC_REMOTE_PORT, &16000u16.to_be_bytes())
        .build();
    bts.rsl_rx(&mut fake, 0, msg).unwrap();

    let nack = fake.sent.last().unwrap();
    assert_eq!(msg_type(nack), 0x72);
    assert_eq!(cause_of(nack), Cause::RES_UNAVAIL.0);
    // the CRCX named a remote, the NACK echoes it
    assert!(find_ie(nack, tag::IPAC_REMOTE_IP).is_some());
    let lchan = bts.lchan(TCH_ID).unwrap();
    assert!(lchan.rtp.is_none());
    assert!(lchan.dl_tch_queue.is_empty());
    assert!(fake.open_socks.is_empty());
}

#[test]
fn crcx_on_signalling_channel_is_rejected() {
    let mut bts = bts_with(Pchan::Sdcch8, 2);
    let mut fake = Fake::default();

    let msg = Inbound::ipac(0x70, ChanNr::sdcch8(2, 1).0).build();
    bts.rsl_rx(&mut fake, 0, msg).unwrap();
    let nack = fake.sent.last().unwrap();
    assert_eq!(msg_type(nack), 0x72);
    assert_eq!(cause_of(nack), 0x52);
}

#[test]
fn crcx_with_existing_socket_is_rejected() {
    let mut bts = bts_with(Pchan::TchF, 1);
    let mut fake = Fake::default();

    let crcx = |remote_port: u16| {
        Inbound::ipac(0x70, ChanNr::tch_f(1).0)
            .tv_fixed(tag::IPAC_REMOTE_IP, &0xc0000205u32.to_be_bytes())
            .tv_fixed(tag::IPAC_REMOTE_PORT, &remote_port.to_be_bytes())
            .build()
    };
    bts.rsl_rx(&mut fake, 0, crcx(16000)).unwrap();
    assert_eq!(msg_type(fake.sent.last().unwrap()), 0x71);

    bts.rsl_rx(&mut fake, 0, crcx(16002)).unwrap();
    let nack = fake.sent.last().unwrap();
    assert_eq!(msg_type(nack), 0x72);
    assert_eq!(cause_of(nack), Cause::RES_UNAVAIL.0);
    // the original socket is untouched
    assert_eq!(fake.open_socks.len(), 1);
}

#[test]
fn property6_si_type_scope_is_enforced() {
    let mut bts = bts_with(Pchan::CcchSdcch4, 0);
    let mut fake = Fake::default();

    // SACCH-only type on the BCCH
    let msg = Inbound::cchan(0x11, ChanNr::bcch().0)
        .tv(tag::SYSINFO_TYPE, 0x05)
        .tlv(tag::FULL_BCCH_INFO, &[0; 18])
        .build();
    bts.rsl_rx(&mut fake, 0, msg).unwrap();
    let rep = fake.sent.last().unwrap();
    assert_eq!(msg_type(rep), 0x1c);
    assert_eq!(cause_of(rep), Cause::IE_CONTENT.0);
    assert!(!bts.si.is_valid(abis_rsl::wire::ie::SiType::Si5));

    // BCCH type as SACCH filling
    let msg = Inbound::trx(0x1a)
        .tv(tag::SYSINFO_TYPE, 0x03)
        .tl16v(tag::L3_INFO, &[0; 18])
        .build();
    bts.rsl_rx(&mut fake, 0, msg).unwrap();
    let rep = fake.sent.last().unwrap();
    assert_eq!(msg_type(rep), 0x1c);
    assert_eq!(cause_of(rep), Cause::IE_CONTENT.0);
}

#[test]
fn sacch_filling_stores_with_ui_header() {
    let mut bts = bts_with(Pchan::CcchSdcch4, 0);
    let mut fake = Fake::default();

    let msg = Inbound::trx(0x1a)
        .tv(tag::SYSINFO_TYPE, 0x05)
        .tl16v(tag::L3_INFO, &[0xaa, 0xbb, 0xcc])
        .build();
    bts.rsl_rx(&mut fake, 0, msg).unwrap();

    let buf = bts.si.get(abis_rsl::wire::ie::SiType::Si5).unwrap();
    assert_eq!(&buf[..5], &[0x03, 0x03, 0xaa, 0xbb, 0xcc]);
    assert_eq!(fake.si_changes, 1);
}

#[test]
fn paging_command_reaches_paging_and_pcu() {
    let mut bts = bts_with(Pchan::CcchSdcch4, 0);
    let mut fake = Fake::default();

    let tmsi = [0x05, 0xf4, 0x01, 0x02, 0x03, 0x04];
    let msg = Inbound::cchan(0x15, ChanNr::pch_agch().0)
        .tv(tag::PAGING_GROUP, 7)
        .tlv(tag::MS_IDENTITY, &tmsi)
        .tv(tag::CHAN_NEEDED, 0x01)
        .build();
    bts.rsl_rx(&mut fake, 0, msg).unwrap();

    let mut lv = vec![tmsi.len() as u8];
    lv.extend_from_slice(&tmsi);
    assert_eq!(fake.paged, vec![(7, lv.clone(), 1)]);
    assert_eq!(fake.pag_reqs, vec![(lv, 1)]);
}

#[test]
fn property1_missing_mandatory_ies() {
    let mut bts = bts_with(Pchan::TchF, 1);
    let mut fake = Fake::default();

    // PAGING COMMAND without the identity
    let msg = Inbound::cchan(0x15, ChanNr::pch_agch().0)
        .tv(tag::PAGING_GROUP, 7)
        .build();
    bts.rsl_rx(&mut fake, 0, msg).unwrap();
    assert_eq!(fake.sent.len(), 1);
    assert_eq!(cause_of(fake.sent.last().unwrap()), Cause::MAND_IE_ERROR.0);
    assert!(fake.paged.is_empty());

    // MODE MODIFY without the channel mode
    let msg = Inbound::dchan(0x29, ChanNr::tch_f(1).0).build();
    bts.rsl_rx(&mut fake, 0, msg).unwrap();
    assert_eq!(fake.sent.len(), 2);
    let nack = fake.sent.last().unwrap();
    assert_eq!(msg_type(nack), 0x2b);
    assert_eq!(cause_of(nack), Cause::MAND_IE_ERROR.0);

    // SMS BROADCAST COMMAND without the message
    let msg = Inbound::cchan(0x1d, ChanNr::pch_agch().0)
        .tv(tag::CB_CMD_TYPE, 0x00)
        .build();
    bts.rsl_rx(&mut fake, 0, msg).unwrap();
    assert_eq!(fake.sent.len(), 3);
    assert_eq!(cause_of(fake.sent.last().unwrap()), Cause::MAND_IE_ERROR.0);
    assert!(fake.smscb.is_empty());

    // ENCRYPTION COMMAND without the link identifier
    let msg = Inbound::dchan(0x26, ChanNr::tch_f(1).0)
        .tlv(tag::ENCR_INFO, &[0x01])
        .tl16v(tag::L3_INFO, &[0x06, 0x35])
        .build();
    bts.rsl_rx(&mut fake, 0, msg).unwrap();
    assert_eq!(fake.sent.len(), 4);
    assert_eq!(cause_of(fake.sent.last().unwrap()), Cause::MAND_IE_ERROR.0);
    assert!(fake.lapdm_rx.is_empty());
}

#[test]
fn activation_on_busy_channel_is_nacked() {
    let mut bts = bts_with(Pchan::TchF, 1);
    let mut fake = Fake::default();
    activate_tch(&mut bts, &mut fake);

    let msg = Inbound::dchan(0x21, ChanNr::tch_f(1).0)
        .tv(tag::ACT_TYPE, act_type::INTRA_NORM_ASS)
        .tlv(tag::CHAN_MODE, &chan_mode_v1())
        .build();
    bts.rsl_rx(&mut fake, 0, msg).unwrap();

    let nack = fake.sent.last().unwrap();
    assert_eq!(msg_type(nack), 0x23);
    assert_eq!(cause_of(nack), Cause::EQUIPMENT_FAIL.0);
}

#[test]
fn encryption_command_rewraps_for_lapdm() {
    let mut bts = bts_with(Pchan::TchF, 1);
    let mut fake = Fake::default();
    activate_tch(&mut bts, &mut fake);

    let l3 = [0x06, 0x35, 0x01];
    let msg = Inbound::dchan(0x26, ChanNr::tch_f(1).0)
        .tlv(tag::ENCR_INFO, &[0x01])
        .tv(tag::LINK_IDENT, 0x00)
        .tl16v(tag::L3_INFO, &l3)
        .build();
    bts.rsl_rx(&mut fake, 0, msg).unwrap();

    let (id, fwd) = fake.lapdm_rx.last().unwrap();
    assert_eq!(*id, TCH_ID);
    // RLL DATA REQuest wrapping the original L3
    assert_eq!(fwd[0] & 0xfe, 0x02);
    assert_eq!(fwd[1], 0x01);
    assert_eq!(TlvReader::find(&fwd[6..], tag::L3_INFO).unwrap(), &l3);
    assert_eq!(bts.lchan(TCH_ID).unwrap().encr.as_ref().unwrap().alg_id, 1);
}

#[test]
fn unsupported_cipher_is_rejected() {
    let mut bts = bts_with(Pchan::TchF, 1);
    let mut fake = Fake::default();
    activate_tch(&mut bts, &mut fake);

    // A5/3 (alg_id 4) is not in the default cipher mask
    let msg = Inbound::dchan(0x26, ChanNr::tch_f(1).0)
        .tlv(tag::ENCR_INFO, &[0x04, 1, 2, 3, 4, 5, 6, 7, 8])
        .tv(tag::LINK_IDENT, 0x00)
        .tl16v(tag::L3_INFO, &[0x06, 0x35])
        .build();
    bts.rsl_rx(&mut fake, 0, msg).unwrap();

    let rep = fake.sent.last().unwrap();
    assert_eq!(msg_type(rep), 0x1c);
    assert_eq!(cause_of(rep), Cause::IE_CONTENT.0);
    assert!(fake.lapdm_rx.is_empty());
}

#[test]
fn ms_power_control_pins_the_level() {
    let mut bts = bts_with(Pchan::TchF, 1);
    let mut fake = Fake::default();
    activate_tch(&mut bts, &mut fake);

    let msg = Inbound::dchan(0x2f, ChanNr::tch_f(1).0)
        .tv(tag::MS_POWER, 0xe7) // only the low 5 bits count
        .build();
    bts.rsl_rx(&mut fake, 0, msg).unwrap();

    let lchan = bts.lchan(TCH_ID).unwrap();
    assert!(lchan.ms_power_ctrl.fixed);
    assert_eq!(lchan.ms_power_ctrl.current, 0x07);
    assert_eq!(fake.phy.last(), Some(&PhyCall::AdjustMsPower(TCH_ID, 0x07)));
}

#[test]
fn sacch_info_modify_rejects_starting_time() {
    let mut bts = bts_with(Pchan::TchF, 1);
    let mut fake = Fake::default();
    activate_tch(&mut bts, &mut fake);

    let msg = Inbound::dchan(0x34, ChanNr::tch_f(1).0)
        .tv_fixed(tag::STARTING_TIME, &[0, 0])
        .tv(tag::SYSINFO_TYPE, 0x05)
        .build();
    bts.rsl_rx(&mut fake, 0, msg).unwrap();
    let rep = fake.sent.last().unwrap();
    assert_eq!(msg_type(rep), 0x1c);
    assert_eq!(cause_of(rep), Cause::SERV_OPT_UNIMPL.0);
}

#[test]
fn sacch_info_modify_sets_and_clears() {
    let mut bts = bts_with(Pchan::TchF, 1);
    let mut fake = Fake::default();
    activate_tch(&mut bts, &mut fake);
    use abis_rsl::wire::ie::SiType;

    let msg = Inbound::dchan(0x34, ChanNr::tch_f(1).0)
        .tv(tag::SYSINFO_TYPE, 0x06)
        .tl16v(tag::L3_INFO, &[0x11, 0x22])
        .build();
    bts.rsl_rx(&mut fake, 0, msg).unwrap();
    let lchan = bts.lchan(TCH_ID).unwrap();
    assert_eq!(&lchan.sacch.get(SiType::Si6).unwrap()[..4], &[3, 3, 0x11, 0x22]);

    let msg = Inbound::dchan(0x34, ChanNr::tch_f(1).0)
        .tv(tag::SYSINFO_TYPE, 0x06)
        .build();
    bts.rsl_rx(&mut fake, 0, msg).unwrap();
    assert!(!bts.lchan(TCH_ID).unwrap().sacch.is_valid(SiType::Si6));
}

#[test]
fn channel_activation_adopts_bts_sacch_filling() {
    let mut bts = bts_with(Pchan::TchF, 1);
    let mut fake = Fake::default();
    use abis_rsl::wire::ie::SiType;

    let msg = Inbound::trx(0x1a)
        .tv(tag::SYSINFO_TYPE, 0x05)
        .tl16v(tag::L3_INFO, &[0x2d, 0x06, 0x1e])
        .build();
    bts.rsl_rx(&mut fake, 0, msg).unwrap();

    activate_tch(&mut bts, &mut fake);
    let lchan = bts.lchan(TCH_ID).unwrap();
    assert_eq!(
        &lchan.sacch.get(SiType::Si5).unwrap()[..5],
        &[0x03, 0x03, 0x2d, 0x06, 0x1e]
    );
}

#[test]
fn meas_report_is_rerouted_as_meas_res() {
    let mut bts = bts_with(Pchan::TchF, 1);
    let mut fake = Fake::default();
    activate_tch(&mut bts, &mut fake);
    bts.lchan_mut(TCH_ID).unwrap().meas.ul_res = Some([0x2a, 0x2a, 0x00]);

    // RLL UNIT DATA INDication on the SACCH with an RR measurement report
    let mut rll = vec![0x02, 0x0b, tag::CHAN_NR, ChanNr::tch_f(1).0, tag::LINK_IDENT, 0x40];
    let l3 = [0x06, 0x15, 0x09, 0x00];
    rll.push(tag::L3_INFO);
    rll.extend_from_slice(&(l3.len() as u16).to_be_bytes());
    rll.extend_from_slice(&l3);
    bts.lapdm_rx(&mut fake, TCH_ID, RslMsg::from_slice(&rll).unwrap());

    let res = fake.sent.last().unwrap();
    assert_eq!(msg_type(res), 0x28);
    assert_eq!(find_ie(res, tag::MEAS_RES_NR).unwrap(), &[0]);
    assert_eq!(find_ie(res, tag::UPLINK_MEAS).unwrap(), &[0x2a, 0x2a, 0x00]);
    assert_eq!(find_ie(res, tag::L3_INFO).unwrap(), &l3);
    // the result number advances, the one-shot measurement is consumed
    assert_eq!(bts.lchan(TCH_ID).unwrap().meas.res_nr, 1);
    assert!(bts.lchan(TCH_ID).unwrap().meas.ul_res.is_none());
}

#[test]
fn non_meas_uplink_is_forwarded() {
    let mut bts = bts_with(Pchan::TchF, 1);
    let mut fake = Fake::default();
    activate_tch(&mut bts, &mut fake);

    let mut rll = vec![0x02, 0x02, tag::CHAN_NR, ChanNr::tch_f(1).0, tag::LINK_IDENT, 0x00];
    rll.push(tag::L3_INFO);
    rll.extend_from_slice(&2u16.to_be_bytes());
    rll.extend_from_slice(&[0x05, 0x08]);
    bts.lapdm_rx(&mut fake, TCH_ID, RslMsg::from_slice(&rll).unwrap());

    assert_eq!(fake.sent.last().unwrap(), &rll);
}

#[test]
fn rll_messages_go_to_lapdm() {
    let mut bts = bts_with(Pchan::TchF, 1);
    let mut fake = Fake::default();

    let est = vec![0x02, 0x04, tag::CHAN_NR, ChanNr::tch_f(1).0, tag::LINK_IDENT, 0x00];
    bts.rsl_rx(&mut fake, 0, RslMsg::from_slice(&est).unwrap())
        .unwrap();
    assert_eq!(fake.lapdm_rx.len(), 1);
    assert_eq!(fake.lapdm_rx[0].1, est);
}

#[test]
fn framing_errors_are_dropped_without_reply() {
    let mut bts = bts_with(Pchan::TchF, 1);
    let mut fake = Fake::default();

    let err = bts.rsl_rx(&mut fake, 0, RslMsg::from_slice(&[0x08]).unwrap());
    assert_eq!(err, Err(abis_rsl::RslError::MsgTooShort));
    let err = bts.rsl_rx(&mut fake, 0, RslMsg::from_slice(&[0x40, 0x21, 0x01, 0x08]).unwrap());
    assert_eq!(err, Err(abis_rsl::RslError::UnknownDiscr(0x40)));
    assert!(fake.sent.is_empty());
}

#[test]
fn unknown_lchan_draws_an_error_report() {
    let mut bts = bts_with(Pchan::TchF, 1);
    let mut fake = Fake::default();

    // C-bits that map to nothing
    let msg = Inbound::dchan(0x21, 0xf8).build();
    bts.rsl_rx(&mut fake, 0, msg).unwrap();
    let rep = fake.sent.last().unwrap();
    assert_eq!(msg_type(rep), 0x1c);
}

#[test]
fn rf_chan_rel_tears_down_rtp_with_dlcx_ind() {
    let mut bts = bts_with(Pchan::TchF, 1);
    let mut fake = Fake::default();
    activate_tch(&mut bts, &mut fake);

    let crcx = Inbound::ipac(0x70, ChanNr::tch_f(1).0)
        .tv_fixed(tag::IPAC_REMOTE_IP, &0xc0000205u32.to_be_bytes())
        .tv_fixed(tag::IPAC_REMOTE_PORT, &16000u16.to_be_bytes())
        .build();
    bts.rsl_rx(&mut fake, 0, crcx).unwrap();

    bts.rsl_rx(
        &mut fake,
        0,
        Inbound::dchan(0x2e, ChanNr::tch_f(1).0).build(),
    )
    .unwrap();

    // DLCX IND precedes the release handling
    let ind = &fake.sent[fake.sent.len() - 1];
    assert_eq!(msg_type(ind), 0x76);
    assert_eq!(cause_of(ind), Cause::NORMAL_UNSPEC.0);
    assert_eq!(find_ie(ind, tag::IPAC_CONN_STAT).unwrap().len(), 28);
    assert!(bts.lchan(TCH_ID).unwrap().rtp.is_none());
    assert!(fake.open_socks.is_empty());

    bts.lchan_rel_confirm(&mut fake, TCH_ID);
    assert_eq!(msg_type(fake.sent.last().unwrap()), 0x33);
}

#[test]
fn dyn3_pdch_activation_acks_immediately() {
    let mut bts = bts_with(Pchan::TchFTchHPdch, 4);
    let mut fake = Fake { pcu_up: true, ..Fake::default() };
    {
        let ts = bts.ts_mut(0, 4).unwrap();
        ts.dynamic.pchan_is = Pchan::Pdch;
        ts.configure_lchans_for(Pchan::Pdch);
    }

    let msg = Inbound::dchan(0x21, ChanNr::osmo_pdch(4).0)
        .tv(tag::ACT_TYPE, act_type::OSMO_PDCH)
        .build();
    bts.rsl_rx(&mut fake, 0, msg).unwrap();

    // acked right away, PCU told, PHY not involved
    assert_eq!(msg_type(fake.sent.last().unwrap()), 0x22);
    assert_eq!(fake.pcu_info_inds, 1);
    assert!(fake.phy.is_empty());
}

#[test]
fn dyn3_release_in_pdch_mode_without_pcu() {
    let mut bts = bts_with(Pchan::TchFTchHPdch, 4);
    let mut fake = Fake::default();
    {
        let ts = bts.ts_mut(0, 4).unwrap();
        ts.dynamic.pchan_is = Pchan::Pdch;
        ts.dynamic.pchan_want = Pchan::Pdch;
        ts.configure_lchans_for(Pchan::Pdch);
    }

    bts.rsl_rx(
        &mut fake,
        0,
        Inbound::dchan(0x2e, ChanNr::osmo_pdch(4).0).build(),
    )
    .unwrap();

    // the PCU is absent, so the release completes immediately
    assert_eq!(msg_type(fake.sent.last().unwrap()), 0x33);
    let ts = bts.ts(0, 4).unwrap();
    assert_eq!(ts.dynamic.pchan_is, Pchan::None);
    assert_eq!(ts.dynamic.pchan_want, Pchan::None);
}

#[test]
fn concurrent_pdch_switch_is_nacked() {
    let mut bts = bts_with(Pchan::TchFPdch, 3);
    let mut fake = Fake::default();
    let chan_nr = ChanNr::tch_f(3);

    bts.rsl_rx(&mut fake, 0, Inbound::dchan(0x48, chan_nr.0).build())
        .unwrap();
    bts.rsl_rx(&mut fake, 0, Inbound::dchan(0x48, chan_nr.0).build())
        .unwrap();

    let nack = fake.sent.last().unwrap();
    assert_eq!(msg_type(nack), 0x4a);
    assert_eq!(cause_of(nack), Cause::NORMAL_UNSPEC.0);
    // the first switchover is still pending
    assert!(bts
        .ts(0, 3)
        .unwrap()
        .flags
        .contains(TsFlags::PDCH_ACT_PENDING));
}

#[test]
fn mode_modify_applies_and_acks() {
    let mut bts = bts_with(Pchan::TchF, 1);
    let mut fake = Fake::default();
    activate_tch(&mut bts, &mut fake);

    let msg = Inbound::dchan(0x29, ChanNr::tch_f(1).0)
        .tlv(tag::CHAN_MODE, &[0x00, 0x01, 0x08, 0x21])
        .build();
    bts.rsl_rx(&mut fake, 0, msg).unwrap();

    assert_eq!(fake.phy.last(), Some(&PhyCall::Modify(TCH_ID)));
    assert_eq!(msg_type(fake.sent.last().unwrap()), 0x2a);
    assert_eq!(
        bts.lchan(TCH_ID).unwrap().tch_mode,
        abis_rsl::wire::ie::TchMode::SpeechEfr
    );
}

#[test]
fn deactivate_sacch_reaches_the_phy() {
    let mut bts = bts_with(Pchan::TchF, 1);
    let mut fake = Fake::default();
    activate_tch(&mut bts, &mut fake);

    bts.rsl_rx(
        &mut fake,
        0,
        Inbound::dchan(0x25, ChanNr::tch_f(1).0).build(),
    )
    .unwrap();
    assert_eq!(fake.phy.last(), Some(&PhyCall::SacchDeactivate(TCH_ID)));
}

#[test]
fn immediate_assign_is_trimmed_and_queued() {
    let mut bts = bts_with(Pchan::CcchSdcch4, 0);
    let mut fake = Fake::default();

    let rr = [0x2d, 0x06, 0x3f, 0x03, 0x0c, 0xe3, 0x69];
    let msg = Inbound::cchan(0x16, ChanNr::pch_agch().0)
        .tl16v(tag::FULL_IMM_ASS_INFO, &rr)
        .build();
    bts.rsl_rx(&mut fake, 0, msg).unwrap();

    assert_eq!(bts.agch_queue_len(), 1);
    assert_eq!(bts.agch_dequeue().unwrap().as_slice(), &rr);
}

#[test]
fn smscb_command_is_forwarded() {
    let mut bts = bts_with(Pchan::CcchSdcch4, 0);
    let mut fake = Fake::default();

    let page = [0x40u8; 88];
    let msg = Inbound::cchan(0x1d, ChanNr::pch_agch().0)
        .tv(tag::CB_CMD_TYPE, 0x00)
        .tlv(tag::SMSCB_MSG, &page)
        .build();
    bts.rsl_rx(&mut fake, 0, msg).unwrap();
    assert_eq!(fake.smscb.len(), 1);
    assert_eq!(fake.smscb[0].0, 0x00);
    assert_eq!(fake.smscb[0].1, page);
}

#[test]
fn si2quater_multi_segment_is_rejected() {
    let mut bts = bts_with(Pchan::CcchSdcch4, 0);
    let mut fake = Fake::default();

    // rest octets with a nonzero segment index
    let mut si2q = [0u8; 21];
    si2q[3] = 0b0001_0000;
    let msg = Inbound::cchan(0x11, ChanNr::bcch().0)
        .tv(tag::SYSINFO_TYPE, 0x29)
        .tlv(tag::FULL_BCCH_INFO, &si2q)
        .build();
    bts.rsl_rx(&mut fake, 0, msg).unwrap();

    let rep = fake.sent.last().unwrap();
    assert_eq!(msg_type(rep), 0x1c);
    assert_eq!(cause_of(rep), Cause::IE_CONTENT.0);
    assert!(!bts.si.is_valid(abis_rsl::wire::ie::SiType::Si2quater));
}

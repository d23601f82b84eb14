//! # RTP endpoint management
//!
//! The ip.access CRCX/MDCX/DLCX dialect: one RTP/RTCP socket pair per
//! traffic channel, created on CRCX, repointed on MDCX and torn down on
//! DLCX or RF channel release (which announces the teardown with a DLCX
//! INDication).

use log::{info, warn};

use crate::backend::{Backend, RtpStats};
use crate::bts::Bts;
use crate::chan::{LchanId, RtpEndpoint};
use crate::dispatch::send_reply;
use crate::wire::build;
use crate::wire::header::MsgType;
use crate::wire::ie::{tag, Cause, ChanNr};
use crate::wire::tlv::for_each_ie;
use crate::RslError;

struct IpacCxReq {
    remote_ip: u32,
    remote_port: u16,
    speech_mode: Option<u8>,
    payload_type: Option<u8>,
    payload_type2: Option<u8>,
}

impl IpacCxReq {
    fn parse(l3: &[u8]) -> IpacCxReq {
        let mut req = IpacCxReq {
            remote_ip: 0,
            remote_port: 0,
            speech_mode: None,
            payload_type: None,
            payload_type2: None,
        };
        for_each_ie(l3, |t, v| match t {
            tag::IPAC_REMOTE_IP => {
                if let Ok(ip) = v.try_into() {
                    req.remote_ip = u32::from_be_bytes(ip);
                }
            }
            tag::IPAC_REMOTE_PORT => {
                if let Ok(port) = v.try_into() {
                    req.remote_port = u16::from_be_bytes(port);
                }
            }
            tag::IPAC_SPEECH_MODE => req.speech_mode = v.first().copied(),
            tag::IPAC_RTP_PAYLOAD => req.payload_type = v.first().copied(),
            tag::IPAC_RTP_PAYLOAD2 => req.payload_type2 = v.first().copied(),
            _ => {}
        })
        .ok();
        req
    }

    fn has_remote(&self) -> bool {
        self.remote_ip != 0 && self.remote_port != 0
    }
}

impl Bts {
    /// CRCX and MDCX, which differ only in whether the socket must
    /// already exist.
    pub(crate) fn rx_ipac_crcx_mdcx<B: Backend>(
        &mut self,
        b: &mut B,
        id: LchanId,
        chan_nr: ChanNr,
        orig: MsgType,
        l3: &[u8],
    ) -> Result<(), RslError> {
        let is_crcx = orig == MsgType::IpacCrcx;
        let name = if is_crcx { "CRCX" } else { "MDCX" };

        // Only traffic channels carry media.
        if !self.lchan(id).is_some_and(|l| l.is_tch()) {
            send_reply(
                b,
                id.trx,
                build::ipac_cx_nack(orig, chan_nr, Cause::MSG_TYPE_ERROR, None),
            );
            return Ok(());
        }

        let req = IpacCxReq::parse(l3);
        // Echo the requested endpoint in a CRCX NACK, as the BSC named
        // one.
        let nack_remote = (is_crcx && req.has_remote())
            .then_some((req.remote_ip, req.remote_port));

        if req.payload_type.is_some() && req.payload_type2.is_some() {
            warn!("{id} rx {name} with both RTP payload types");
            send_reply(
                b,
                id.trx,
                build::ipac_cx_nack(orig, chan_nr, Cause::MAND_IE_ERROR, nack_remote),
            );
            return Ok(());
        }

        let socket = if is_crcx {
            if self.lchan(id).is_some_and(|l| l.rtp.is_some()) {
                warn!("{id} rx CRCX, but the channel already has a socket");
                send_reply(
                    b,
                    id.trx,
                    build::ipac_cx_nack(orig, chan_nr, Cause::RES_UNAVAIL, nack_remote),
                );
                return Ok(());
            }
            let Some(socket) = b.create(id) else {
                warn!("{id} failed to create RTP/RTCP sockets");
                send_reply(
                    b,
                    id.trx,
                    build::ipac_cx_nack(orig, chan_nr, Cause::RES_UNAVAIL, nack_remote),
                );
                return Ok(());
            };
            let (adaptive, buf_ms) = (
                self.config.rtp_jitter_adaptive,
                self.config.rtp_jitter_buf_ms,
            );
            if b.set_jitter(socket, adaptive, buf_ms).is_err() {
                warn!("{id} failed to set RTP socket parameters");
            }

            // With a remote endpoint named, bind to the wildcard address
            // and let connect() pick the local one; without, bind to the
            // RSL link's address so the ACK reports something real.
            let local_ip = if req.has_remote() {
                0
            } else {
                b.rsl_local_ip(id.trx).unwrap_or(0)
            };
            if b.bind(socket, local_ip).is_err() {
                warn!("{id} failed to bind RTP/RTCP sockets");
                b.close(socket);
                self.flush_dl_tch(id);
                send_reply(
                    b,
                    id.trx,
                    build::ipac_cx_nack(orig, chan_nr, Cause::RES_UNAVAIL, nack_remote),
                );
                return Ok(());
            }
            if let Some(lchan) = self.lchan_mut(id) {
                lchan.rtp = Some(RtpEndpoint {
                    socket,
                    conn_id: 0,
                    bound_ip: 0,
                    bound_port: 0,
                    connect_ip: 0,
                    connect_port: 0,
                    rtp_payload: 0,
                    rtp_payload2: 0,
                    speech_mode: 0,
                });
            }
            socket
        } else {
            match self.lchan(id).and_then(|l| l.rtp.as_ref()) {
                Some(ep) => ep.socket,
                None => {
                    warn!("{id} rx MDCX, but the channel has no RTP socket");
                    send_reply(
                        b,
                        id.trx,
                        build::ipac_cx_nack(orig, chan_nr, Cause::RES_UNAVAIL, nack_remote),
                    );
                    return Ok(());
                }
            }
        };

        // connect() towards the remote; a wildcard remote address means
        // the A-bis peer itself.
        if req.remote_port != 0 {
            let remote_ip = if req.remote_ip == 0 {
                b.rsl_peer_ip(id.trx)
            } else {
                req.remote_ip
            };
            if b.connect(socket, remote_ip, req.remote_port).is_err() {
                warn!("{id} failed to connect RTP/RTCP sockets");
                b.close(socket);
                if let Some(lchan) = self.lchan_mut(id) {
                    lchan.rtp = None;
                }
                self.flush_dl_tch(id);
                send_reply(
                    b,
                    id.trx,
                    build::ipac_cx_nack(orig, chan_nr, Cause::RES_UNAVAIL, nack_remote),
                );
                return Ok(());
            }
            if let Some(ep) = self.lchan_mut(id).and_then(|l| l.rtp.as_mut()) {
                ep.connect_ip = remote_ip;
                ep.connect_port = req.remote_port;
            }
        }

        let (bound_ip, bound_port) = b.bound_ip_port(socket);
        for pt in [req.payload_type, req.payload_type2].into_iter().flatten() {
            b.set_payload_type(socket, pt);
        }

        let Some(ep) = self.lchan_mut(id).and_then(|l| l.rtp.as_mut()) else {
            return Ok(());
        };
        ep.bound_ip = bound_ip;
        ep.bound_port = bound_port;
        if let Some(pt) = req.payload_type {
            ep.rtp_payload = pt;
        }
        if let Some(pt2) = req.payload_type2 {
            ep.rtp_payload2 = pt2;
        }
        if let Some(mode) = req.speech_mode {
            ep.speech_mode = mode;
        }
        let conn_id = ep.conn_id;
        let payload2 = req.payload_type2.map(|_| ep.rtp_payload2);

        info!(
            "{id} tx IPAC {name} ACK (local 0x{bound_ip:08x}:{bound_port}, remote 0x{:08x}:{})",
            req.remote_ip, req.remote_port
        );
        send_reply(
            b,
            id.trx,
            build::ipac_cx_ack(orig, chan_nr, conn_id, bound_ip, bound_port, payload2),
        );
        Ok(())
    }

    /// DLCX: ack (with stats when asked by connection id), then free the
    /// socket and flush the downlink queue regardless.
    pub(crate) fn rx_ipac_dlcx<B: Backend>(
        &mut self,
        b: &mut B,
        id: LchanId,
        chan_nr: ChanNr,
        l3: &[u8],
    ) -> Result<(), RslError> {
        let mut conn_id_present = false;
        for_each_ie(l3, |t, _| {
            if t == tag::IPAC_CONN_ID {
                conn_id_present = true;
            }
        })
        .ok();

        let ep = self.lchan(id).and_then(|l| l.rtp.as_ref()).copied();
        let stats = ep
            .map(|ep| b.stats(ep.socket))
            .unwrap_or_else(RtpStats::default);
        let conn_id = ep.map(|ep| ep.conn_id).unwrap_or(0);

        info!("{id} tx IPAC DLCX ACK, closing RTP socket");
        send_reply(
            b,
            id.trx,
            build::ipac_dlcx_ack(chan_nr, conn_id_present.then_some((conn_id, &stats))),
        );
        self.free_rtp_endpoint(b, id);
        Ok(())
    }

    /// Spontaneous DLCX INDication ahead of a locally driven teardown.
    pub(crate) fn tx_ipac_dlcx_ind<B: Backend>(&mut self, b: &mut B, id: LchanId, cause: Cause) {
        let chan_nr = self.chan_nr(id);
        let Some(ep) = self.lchan(id).and_then(|l| l.rtp.as_ref()).copied() else {
            return;
        };
        let stats = b.stats(ep.socket);
        info!("{id} tx RTP delete indication, cause=0x{:02x}", cause.0);
        send_reply(
            b,
            id.trx,
            build::ipac_dlcx_ind(chan_nr, ep.conn_id, &stats, cause),
        );
    }

    /// Drop the endpoint: close the socket, forget it, flush the
    /// downlink traffic queue.
    pub(crate) fn free_rtp_endpoint<B: Backend>(&mut self, b: &mut B, id: LchanId) {
        if let Some(ep) = self.lchan_mut(id).and_then(|l| l.rtp.take()) {
            b.close(ep.socket);
        }
        self.flush_dl_tch(id);
    }

    fn flush_dl_tch(&mut self, id: LchanId) {
        if let Some(lchan) = self.lchan_mut(id) {
            lchan.flush_dl_tch_queue();
        }
    }
}

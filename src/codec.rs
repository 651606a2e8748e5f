//! Wire codec for the netlink process connector.
//!
//! Layouts follow `<linux/netlink.h>`, `<linux/connector.h>` and
//! `<linux/cn_proc.h>`. Every decode checks lengths before reading a field,
//! so a short or lying datagram becomes a [`DecodeError`] instead of garbage.
//!
//! The kernel writes these records in host byte order. [`WireCodec::native`]
//! fixes that order once; tests can build a codec with the opposite order to
//! check the encoder and decoder agree.

use crate::error::DecodeError;
use crate::event::{
    IdKind, Pid, PROC_EVENT_COMM, PROC_EVENT_COREDUMP, PROC_EVENT_EXEC, PROC_EVENT_EXIT,
    PROC_EVENT_FORK, PROC_EVENT_GID, PROC_EVENT_PTRACE, PROC_EVENT_SID, PROC_EVENT_UID,
};

/// `struct nlmsghdr`
pub const NLMSG_HDRLEN: usize = 16;
/// `struct cn_msg` without its data
pub const CN_MSG_LEN: usize = 20;
/// `what`, `cpu`, `timestamp_ns` of `struct proc_event`
pub const PROC_EVENT_HEADER_LEN: usize = 16;
/// Largest `event_data` union member (exit and comm).
pub const PROC_EVENT_DATA_LEN: usize = 24;
/// Smallest datagram the read loop accepts.
pub const MIN_ENVELOPE_LEN: usize = NLMSG_HDRLEN + CN_MSG_LEN;

const NLMSG_ALIGNTO: usize = 4;
const TASK_COMM_LEN: usize = 16;

pub const NLMSG_NOOP: u16 = 1;
pub const NLMSG_ERROR: u16 = 2;
pub const NLMSG_DONE: u16 = 3;

pub const CN_IDX_PROC: u32 = 0x1;
pub const CN_VAL_PROC: u32 = 0x1;

/// `enum proc_cn_mcast_op`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ControlOp {
    Listen = 1,
    Ignore = 2,
}

impl ControlOp {
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            1 => Some(ControlOp::Listen),
            2 => Some(ControlOp::Ignore),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    pub const fn native() -> Self {
        if cfg!(target_endian = "little") {
            ByteOrder::Little
        } else {
            ByteOrder::Big
        }
    }

    fn u16_from(self, b: [u8; 2]) -> u16 {
        match self {
            ByteOrder::Little => u16::from_le_bytes(b),
            ByteOrder::Big => u16::from_be_bytes(b),
        }
    }

    fn u32_from(self, b: [u8; 4]) -> u32 {
        match self {
            ByteOrder::Little => u32::from_le_bytes(b),
            ByteOrder::Big => u32::from_be_bytes(b),
        }
    }

    fn u64_from(self, b: [u8; 8]) -> u64 {
        match self {
            ByteOrder::Little => u64::from_le_bytes(b),
            ByteOrder::Big => u64::from_be_bytes(b),
        }
    }

    fn u16_to(self, v: u16) -> [u8; 2] {
        match self {
            ByteOrder::Little => v.to_le_bytes(),
            ByteOrder::Big => v.to_be_bytes(),
        }
    }

    fn u32_to(self, v: u32) -> [u8; 4] {
        match self {
            ByteOrder::Little => v.to_le_bytes(),
            ByteOrder::Big => v.to_be_bytes(),
        }
    }

    fn u64_to(self, v: u64) -> [u8; 8] {
        match self {
            ByteOrder::Little => v.to_le_bytes(),
            ByteOrder::Big => v.to_be_bytes(),
        }
    }
}

/// `struct nlmsghdr`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetlinkHeader {
    pub len: u32,
    pub msg_type: u16,
    pub flags: u16,
    pub seq: u32,
    pub pid: u32,
}

/// `struct cn_msg` header fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectorHeader {
    pub idx: u32,
    pub val: u32,
    pub seq: u32,
    pub ack: u32,
    pub len: u16,
    pub flags: u16,
}

/// Netlink header plus, for `NLMSG_DONE` messages, the connector header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Envelope {
    pub netlink: NetlinkHeader,
    pub connector: Option<ConnectorHeader>,
}

impl Envelope {
    pub fn is_done(&self) -> bool {
        self.netlink.msg_type == NLMSG_DONE
    }

    /// True when the connector id selects the process event class.
    pub fn is_proc_event(&self) -> bool {
        matches!(
            self.connector,
            Some(ConnectorHeader { idx: CN_IDX_PROC, val: CN_VAL_PROC, .. })
        )
    }

    /// Bytes this message occupies in a datagram, including alignment padding.
    pub fn aligned_len(&self) -> usize {
        nlmsg_align(self.netlink.len as usize)
    }
}

/// `what`, `cpu` and `timestamp_ns` of `struct proc_event`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcEventHeader {
    pub what: u32,
    pub cpu: u32,
    pub timestamp_ns: u64,
}

/// Decoded `event_data` union.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Fork {
        parent_pid: Pid,
        parent_tgid: Pid,
        child_pid: Pid,
        child_tgid: Pid,
    },
    Exec {
        pid: Pid,
        tgid: Pid,
    },
    Exit {
        pid: Pid,
        tgid: Pid,
        exit_code: u32,
        exit_signal: u32,
    },
    Id {
        kind: IdKind,
        pid: Pid,
        tgid: Pid,
        real_id: u32,
        effective_id: u32,
    },
    Sid {
        pid: Pid,
        tgid: Pid,
    },
    Ptrace {
        pid: Pid,
        tgid: Pid,
        tracer_pid: Pid,
        tracer_tgid: Pid,
    },
    Comm {
        pid: Pid,
        tgid: Pid,
        comm: String,
    },
    Coredump {
        pid: Pid,
        tgid: Pid,
    },
    /// Kind 0 (listen acknowledgement) or a kind this codec does not know.
    Ignored { what: u32 },
}

impl Payload {
    /// The logical process id the event is about. Fork reports the child.
    pub fn tgid(&self) -> Option<Pid> {
        match self {
            Payload::Fork { child_tgid, .. } => Some(*child_tgid),
            Payload::Exec { tgid, .. }
            | Payload::Exit { tgid, .. }
            | Payload::Id { tgid, .. }
            | Payload::Sid { tgid, .. }
            | Payload::Ptrace { tgid, .. }
            | Payload::Comm { tgid, .. }
            | Payload::Coredump { tgid, .. } => Some(*tgid),
            Payload::Ignored { .. } => None,
        }
    }

    /// The `what` value that selects this variant on the wire.
    pub fn what(&self) -> u32 {
        match self {
            Payload::Fork { .. } => PROC_EVENT_FORK,
            Payload::Exec { .. } => PROC_EVENT_EXEC,
            Payload::Exit { .. } => PROC_EVENT_EXIT,
            Payload::Id { kind: IdKind::Uid, .. } => PROC_EVENT_UID,
            Payload::Id { kind: IdKind::Gid, .. } => PROC_EVENT_GID,
            Payload::Sid { .. } => PROC_EVENT_SID,
            Payload::Ptrace { .. } => PROC_EVENT_PTRACE,
            Payload::Comm { .. } => PROC_EVENT_COMM,
            Payload::Coredump { .. } => PROC_EVENT_COREDUMP,
            Payload::Ignored { what } => *what,
        }
    }
}

fn nlmsg_align(len: usize) -> usize {
    (len + NLMSG_ALIGNTO - 1) & !(NLMSG_ALIGNTO - 1)
}

/// Bounds-checked cursor over one record.
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
    order: ByteOrder,
    what: &'static str,
}

impl<'a> Reader<'a> {
    fn new(
        buf: &'a [u8],
        order: ByteOrder,
        what: &'static str,
        needed: usize,
    ) -> Result<Self, DecodeError> {
        if buf.len() < needed {
            return Err(DecodeError::Truncated {
                what,
                needed,
                available: buf.len(),
            });
        }
        Ok(Self {
            buf,
            pos: 0,
            order,
            what,
        })
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let end = self.pos + N;
        let bytes = self
            .buf
            .get(self.pos..end)
            .ok_or(DecodeError::Truncated {
                what: self.what,
                needed: end,
                available: self.buf.len(),
            })?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        self.pos = end;
        Ok(out)
    }

    fn u16(&mut self) -> Result<u16, DecodeError> {
        Ok(self.order.u16_from(self.take()?))
    }

    fn u32(&mut self) -> Result<u32, DecodeError> {
        Ok(self.order.u32_from(self.take()?))
    }

    fn u64(&mut self) -> Result<u64, DecodeError> {
        Ok(self.order.u64_from(self.take()?))
    }

    fn pid(&mut self) -> Result<Pid, DecodeError> {
        Ok(self.u32()? as Pid)
    }

    fn rest(&self) -> &'a [u8] {
        &self.buf[self.pos..]
    }
}

/// Byte-order aware encoder/decoder. Stateless apart from the byte order.
#[derive(Debug, Clone, Copy)]
pub struct WireCodec {
    order: ByteOrder,
}

impl Default for WireCodec {
    fn default() -> Self {
        Self::native()
    }
}

impl WireCodec {
    pub fn new(order: ByteOrder) -> Self {
        Self { order }
    }

    /// Codec for data produced by the running kernel.
    pub fn native() -> Self {
        Self::new(ByteOrder::native())
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.order
    }

    /// Builds a LISTEN/IGNORE control message for the connector.
    pub fn encode_control(&self, op: ControlOp, seq: u32, pid: u32) -> Vec<u8> {
        let data = self.order.u32_to(op as u32);
        self.encode_message(seq, pid, &data)
    }

    /// Builds a kernel-format process event datagram.
    ///
    /// The event data is zero-padded to the size of the kernel's union, so
    /// the result has the same length as a real notification.
    pub fn encode_event(&self, seq: u32, header: &ProcEventHeader, payload: &Payload) -> Vec<u8> {
        let mut data = Vec::with_capacity(PROC_EVENT_HEADER_LEN + PROC_EVENT_DATA_LEN);
        data.extend_from_slice(&self.order.u32_to(header.what));
        data.extend_from_slice(&self.order.u32_to(header.cpu));
        data.extend_from_slice(&self.order.u64_to(header.timestamp_ns));

        let start = data.len();
        let (words, comm): (Vec<u32>, Option<&str>) = match payload {
            Payload::Fork {
                parent_pid,
                parent_tgid,
                child_pid,
                child_tgid,
            } => (
                vec![
                    *parent_pid as u32,
                    *parent_tgid as u32,
                    *child_pid as u32,
                    *child_tgid as u32,
                ],
                None,
            ),
            Payload::Exit {
                pid,
                tgid,
                exit_code,
                exit_signal,
            } => (vec![*pid as u32, *tgid as u32, *exit_code, *exit_signal], None),
            Payload::Id {
                pid,
                tgid,
                real_id,
                effective_id,
                ..
            } => (vec![*pid as u32, *tgid as u32, *real_id, *effective_id], None),
            Payload::Ptrace {
                pid,
                tgid,
                tracer_pid,
                tracer_tgid,
            } => (
                vec![*pid as u32, *tgid as u32, *tracer_pid as u32, *tracer_tgid as u32],
                None,
            ),
            Payload::Exec { pid, tgid }
            | Payload::Sid { pid, tgid }
            | Payload::Coredump { pid, tgid } => (vec![*pid as u32, *tgid as u32], None),
            Payload::Comm { pid, tgid, comm } => {
                (vec![*pid as u32, *tgid as u32], Some(comm.as_str()))
            }
            Payload::Ignored { .. } => (Vec::new(), None),
        };
        for word in words {
            data.extend_from_slice(&self.order.u32_to(word));
        }
        if let Some(comm) = comm {
            let mut name = [0u8; TASK_COMM_LEN];
            let len = comm.len().min(TASK_COMM_LEN - 1);
            name[..len].copy_from_slice(&comm.as_bytes()[..len]);
            data.extend_from_slice(&name);
        }
        data.resize(start + PROC_EVENT_DATA_LEN, 0);

        self.encode_message(seq, 0, &data)
    }

    fn encode_message(&self, seq: u32, pid: u32, data: &[u8]) -> Vec<u8> {
        let total = MIN_ENVELOPE_LEN + data.len();
        let mut buf = Vec::with_capacity(total);

        // nlmsghdr
        buf.extend_from_slice(&self.order.u32_to(total as u32));
        buf.extend_from_slice(&self.order.u16_to(NLMSG_DONE));
        buf.extend_from_slice(&self.order.u16_to(0));
        buf.extend_from_slice(&self.order.u32_to(seq));
        buf.extend_from_slice(&self.order.u32_to(pid));

        // cn_msg
        buf.extend_from_slice(&self.order.u32_to(CN_IDX_PROC));
        buf.extend_from_slice(&self.order.u32_to(CN_VAL_PROC));
        buf.extend_from_slice(&self.order.u32_to(seq));
        buf.extend_from_slice(&self.order.u32_to(0));
        buf.extend_from_slice(&self.order.u16_to(data.len() as u16));
        buf.extend_from_slice(&self.order.u16_to(0));

        buf.extend_from_slice(data);
        buf
    }

    /// Decodes one netlink message from the front of `bytes`.
    ///
    /// Returns the envelope and the connector payload (`cn_msg.len` bytes).
    /// For messages other than `NLMSG_DONE` no connector header is parsed and
    /// the payload is empty. Use [`Envelope::aligned_len`] to find the next
    /// message in the same datagram.
    pub fn decode_envelope<'a>(
        &self,
        bytes: &'a [u8],
    ) -> Result<(Envelope, &'a [u8]), DecodeError> {
        if bytes.len() < NLMSG_HDRLEN {
            return Err(DecodeError::MalformedEnvelope {
                needed: NLMSG_HDRLEN,
                available: bytes.len(),
            });
        }
        let mut r = Reader::new(bytes, self.order, "netlink header", NLMSG_HDRLEN)?;
        let netlink = NetlinkHeader {
            len: r.u32()?,
            msg_type: r.u16()?,
            flags: r.u16()?,
            seq: r.u32()?,
            pid: r.u32()?,
        };

        let msg_len = netlink.len as usize;
        if msg_len < NLMSG_HDRLEN || msg_len > bytes.len() {
            return Err(DecodeError::MalformedEnvelope {
                needed: msg_len.max(NLMSG_HDRLEN),
                available: bytes.len(),
            });
        }

        if netlink.msg_type != NLMSG_DONE {
            return Ok((
                Envelope {
                    netlink,
                    connector: None,
                },
                &[],
            ));
        }

        if msg_len < MIN_ENVELOPE_LEN {
            return Err(DecodeError::MalformedEnvelope {
                needed: MIN_ENVELOPE_LEN,
                available: msg_len,
            });
        }

        let mut r = Reader::new(
            &bytes[NLMSG_HDRLEN..msg_len],
            self.order,
            "connector header",
            CN_MSG_LEN,
        )?;
        let connector = ConnectorHeader {
            idx: r.u32()?,
            val: r.u32()?,
            seq: r.u32()?,
            ack: r.u32()?,
            len: r.u16()?,
            flags: r.u16()?,
        };

        let available = r.rest();
        let declared = connector.len as usize;
        // Trailing bytes are only allowed as netlink alignment padding.
        if declared > available.len() || available.len() - declared >= NLMSG_ALIGNTO {
            return Err(DecodeError::PayloadLengthMismatch {
                declared,
                available: available.len(),
            });
        }

        Ok((
            Envelope {
                netlink,
                connector: Some(connector),
            },
            &available[..declared],
        ))
    }

    /// Decodes the `proc_event` header, returning the event data that follows.
    pub fn decode_event_header<'a>(
        &self,
        bytes: &'a [u8],
    ) -> Result<(ProcEventHeader, &'a [u8]), DecodeError> {
        let mut r = Reader::new(bytes, self.order, "event header", PROC_EVENT_HEADER_LEN)?;
        let header = ProcEventHeader {
            what: r.u32()?,
            cpu: r.u32()?,
            timestamp_ns: r.u64()?,
        };
        Ok((header, r.rest()))
    }

    /// Decodes the event data for `what`. Unknown kinds yield [`Payload::Ignored`].
    pub fn decode_payload(&self, what: u32, bytes: &[u8]) -> Result<Payload, DecodeError> {
        let payload = match what {
            PROC_EVENT_FORK => {
                let mut r = Reader::new(bytes, self.order, "fork event", 16)?;
                Payload::Fork {
                    parent_pid: r.pid()?,
                    parent_tgid: r.pid()?,
                    child_pid: r.pid()?,
                    child_tgid: r.pid()?,
                }
            }
            PROC_EVENT_EXEC => {
                let mut r = Reader::new(bytes, self.order, "exec event", 8)?;
                Payload::Exec {
                    pid: r.pid()?,
                    tgid: r.pid()?,
                }
            }
            PROC_EVENT_EXIT => {
                // Newer kernels append parent_pid/parent_tgid; they are not read.
                let mut r = Reader::new(bytes, self.order, "exit event", 16)?;
                Payload::Exit {
                    pid: r.pid()?,
                    tgid: r.pid()?,
                    exit_code: r.u32()?,
                    exit_signal: r.u32()?,
                }
            }
            PROC_EVENT_UID | PROC_EVENT_GID => {
                let mut r = Reader::new(bytes, self.order, "id event", 16)?;
                Payload::Id {
                    kind: if what == PROC_EVENT_UID {
                        IdKind::Uid
                    } else {
                        IdKind::Gid
                    },
                    pid: r.pid()?,
                    tgid: r.pid()?,
                    real_id: r.u32()?,
                    effective_id: r.u32()?,
                }
            }
            PROC_EVENT_SID => {
                let mut r = Reader::new(bytes, self.order, "sid event", 8)?;
                Payload::Sid {
                    pid: r.pid()?,
                    tgid: r.pid()?,
                }
            }
            PROC_EVENT_PTRACE => {
                let mut r = Reader::new(bytes, self.order, "ptrace event", 16)?;
                Payload::Ptrace {
                    pid: r.pid()?,
                    tgid: r.pid()?,
                    tracer_pid: r.pid()?,
                    tracer_tgid: r.pid()?,
                }
            }
            PROC_EVENT_COMM => {
                let mut r = Reader::new(bytes, self.order, "comm event", 8 + TASK_COMM_LEN)?;
                let pid = r.pid()?;
                let tgid = r.pid()?;
                let raw: [u8; TASK_COMM_LEN] = r.take()?;
                let end = raw.iter().position(|b| *b == 0).unwrap_or(TASK_COMM_LEN);
                Payload::Comm {
                    pid,
                    tgid,
                    comm: String::from_utf8_lossy(&raw[..end]).into_owned(),
                }
            }
            PROC_EVENT_COREDUMP => {
                let mut r = Reader::new(bytes, self.order, "coredump event", 8)?;
                Payload::Coredump {
                    pid: r.pid()?,
                    tgid: r.pid()?,
                }
            }
            other => Payload::Ignored { what: other },
        };
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::PROC_EVENT_NONE;

    fn header(what: u32) -> ProcEventHeader {
        ProcEventHeader {
            what,
            cpu: 3,
            timestamp_ns: 1_234_567_890,
        }
    }

    #[test]
    fn test_control_message_layout() {
        let codec = WireCodec::new(ByteOrder::Little);
        let buf = codec.encode_control(ControlOp::Listen, 7, 4242);

        assert_eq!(buf.len(), MIN_ENVELOPE_LEN + 4);
        // nlmsg_len
        assert_eq!(&buf[0..4], &(40u32).to_le_bytes());
        // nlmsg_type = NLMSG_DONE
        assert_eq!(&buf[4..6], &3u16.to_le_bytes());
        // nlmsg_pid
        assert_eq!(&buf[12..16], &4242u32.to_le_bytes());
        // cn_msg.len
        assert_eq!(&buf[32..34], &4u16.to_le_bytes());
        // op
        assert_eq!(&buf[36..40], &1u32.to_le_bytes());
    }

    #[test]
    fn test_control_message_decodes_back() {
        for order in [ByteOrder::Little, ByteOrder::Big] {
            let codec = WireCodec::new(order);
            let buf = codec.encode_control(ControlOp::Ignore, 99, 17);
            let (env, payload) = codec.decode_envelope(&buf).unwrap();

            assert!(env.is_done());
            assert!(env.is_proc_event());
            assert_eq!(env.netlink.len as usize, buf.len());
            assert_eq!(env.netlink.seq, 99);
            assert_eq!(env.netlink.pid, 17);
            let cn = env.connector.unwrap();
            assert_eq!(cn.len, 4);
            assert_eq!(cn.seq, 99);

            let op = order.u32_from(payload.try_into().unwrap());
            assert_eq!(ControlOp::from_u32(op), Some(ControlOp::Ignore));
        }
    }

    #[test]
    fn test_event_datagram_matches_kernel_size() {
        let codec = WireCodec::native();
        let payload = Payload::Exec { pid: 5, tgid: 5 };
        let buf = codec.encode_event(1, &header(PROC_EVENT_EXEC), &payload);
        assert_eq!(
            buf.len(),
            MIN_ENVELOPE_LEN + PROC_EVENT_HEADER_LEN + PROC_EVENT_DATA_LEN
        );
    }

    #[test]
    fn test_decode_full_event() {
        let codec = WireCodec::new(ByteOrder::Big);
        let payload = Payload::Exit {
            pid: 101,
            tgid: 100,
            exit_code: 256,
            exit_signal: 17,
        };
        let buf = codec.encode_event(5, &header(PROC_EVENT_EXIT), &payload);

        let (env, data) = codec.decode_envelope(&buf).unwrap();
        assert!(env.is_proc_event());
        let (hdr, rest) = codec.decode_event_header(data).unwrap();
        assert_eq!(hdr, header(PROC_EVENT_EXIT));
        let decoded = codec.decode_payload(hdr.what, rest).unwrap();
        assert_eq!(decoded, payload);
        assert_eq!(decoded.tgid(), Some(100));
    }

    #[test]
    fn test_comm_is_nul_terminated() {
        let codec = WireCodec::native();
        let payload = Payload::Comm {
            pid: 9,
            tgid: 9,
            comm: "kworker/u8:2".to_string(),
        };
        let buf = codec.encode_event(1, &header(PROC_EVENT_COMM), &payload);
        let (_, data) = codec.decode_envelope(&buf).unwrap();
        let (hdr, rest) = codec.decode_event_header(data).unwrap();
        assert_eq!(codec.decode_payload(hdr.what, rest).unwrap(), payload);
    }

    #[test]
    fn test_short_envelope_is_malformed() {
        let codec = WireCodec::native();
        let err = codec.decode_envelope(&[0u8; 10]).unwrap_err();
        assert_eq!(
            err,
            DecodeError::MalformedEnvelope {
                needed: NLMSG_HDRLEN,
                available: 10
            }
        );
    }

    #[test]
    fn test_netlink_len_past_end_is_malformed() {
        let codec = WireCodec::native();
        let mut buf = codec.encode_control(ControlOp::Listen, 1, 1);
        buf.truncate(30);
        assert!(matches!(
            codec.decode_envelope(&buf),
            Err(DecodeError::MalformedEnvelope { needed: 40, available: 30 })
        ));
    }

    #[test]
    fn test_payload_length_mismatch() {
        let codec = WireCodec::new(ByteOrder::Little);
        let mut buf = codec.encode_control(ControlOp::Listen, 1, 1);
        // Claim 12 payload bytes while only 4 follow.
        buf[32..34].copy_from_slice(&12u16.to_le_bytes());
        assert_eq!(
            codec.decode_envelope(&buf).unwrap_err(),
            DecodeError::PayloadLengthMismatch {
                declared: 12,
                available: 4
            }
        );
    }

    #[test]
    fn test_non_done_message_has_no_connector() {
        let codec = WireCodec::new(ByteOrder::Little);
        let mut buf = codec.encode_control(ControlOp::Listen, 1, 1);
        buf[4..6].copy_from_slice(&NLMSG_ERROR.to_le_bytes());
        let (env, payload) = codec.decode_envelope(&buf).unwrap();
        assert!(!env.is_done());
        assert!(env.connector.is_none());
        assert!(payload.is_empty());
        assert_eq!(env.aligned_len(), 40);
    }

    #[test]
    fn test_truncated_payload() {
        let codec = WireCodec::native();
        let err = codec.decode_payload(PROC_EVENT_FORK, &[0u8; 12]).unwrap_err();
        assert_eq!(
            err,
            DecodeError::Truncated {
                what: "fork event",
                needed: 16,
                available: 12
            }
        );
    }

    #[test]
    fn test_unknown_kind_is_ignored() {
        let codec = WireCodec::native();
        assert_eq!(
            codec.decode_payload(0, &[]).unwrap(),
            Payload::Ignored { what: 0 }
        );
        assert_eq!(
            codec.decode_payload(0x0000_0400, &[1, 2, 3]).unwrap(),
            Payload::Ignored { what: 0x0000_0400 }
        );
    }

    #[test]
    fn test_gid_decodes_as_id_change() {
        let codec = WireCodec::native();
        let payload = Payload::Id {
            kind: IdKind::Gid,
            pid: 30,
            tgid: 30,
            real_id: 1000,
            effective_id: 0,
        };
        let buf = codec.encode_event(1, &header(PROC_EVENT_GID), &payload);
        let (_, data) = codec.decode_envelope(&buf).unwrap();
        let (hdr, rest) = codec.decode_event_header(data).unwrap();
        assert_eq!(hdr.what, PROC_EVENT_GID);
        assert_eq!(codec.decode_payload(hdr.what, rest).unwrap(), payload);
    }

    #[test]
    fn test_nlmsg_align() {
        assert_eq!(nlmsg_align(0), 0);
        assert_eq!(nlmsg_align(1), 4);
        assert_eq!(nlmsg_align(76), 76);
        assert_eq!(nlmsg_align(77), 80);
    }

    fn every_payload() -> Vec<(u32, Payload)> {
        vec![
            (
                PROC_EVENT_FORK,
                Payload::Fork {
                    parent_pid: 10,
                    parent_tgid: 9,
                    child_pid: 12,
                    child_tgid: 11,
                },
            ),
            (PROC_EVENT_EXEC, Payload::Exec { pid: 21, tgid: 20 }),
            (
                PROC_EVENT_EXIT,
                Payload::Exit {
                    pid: 31,
                    tgid: 30,
                    exit_code: 0x0100,
                    exit_signal: 17,
                },
            ),
            (
                PROC_EVENT_UID,
                Payload::Id {
                    kind: IdKind::Uid,
                    pid: 41,
                    tgid: 40,
                    real_id: 1000,
                    effective_id: 0,
                },
            ),
            (
                PROC_EVENT_GID,
                Payload::Id {
                    kind: IdKind::Gid,
                    pid: 43,
                    tgid: 42,
                    real_id: 100,
                    effective_id: 4,
                },
            ),
            (PROC_EVENT_SID, Payload::Sid { pid: 51, tgid: 50 }),
            (
                PROC_EVENT_PTRACE,
                Payload::Ptrace {
                    pid: 61,
                    tgid: 60,
                    tracer_pid: 71,
                    tracer_tgid: 70,
                },
            ),
            (
                PROC_EVENT_COMM,
                Payload::Comm {
                    pid: 81,
                    tgid: 80,
                    comm: "kworker/u8".to_string(),
                },
            ),
            (PROC_EVENT_COREDUMP, Payload::Coredump { pid: 91, tgid: 90 }),
            (PROC_EVENT_NONE, Payload::Ignored { what: PROC_EVENT_NONE }),
        ]
    }

    #[test]
    fn test_every_payload_variant_survives_the_wire() {
        for order in [ByteOrder::Little, ByteOrder::Big] {
            let codec = WireCodec::new(order);
            for (what, payload) in every_payload() {
                assert_eq!(payload.what(), what, "{payload:?}");

                let buf = codec.encode_event(3, &header(what), &payload);
                let (env, body) = codec.decode_envelope(&buf).unwrap();
                assert!(env.is_done() && env.is_proc_event());

                let (decoded_header, data) = codec.decode_event_header(body).unwrap();
                assert_eq!(decoded_header, header(what));
                let decoded = codec.decode_payload(decoded_header.what, data).unwrap();
                assert_eq!(decoded, payload, "{order:?}");
            }
        }
    }
}

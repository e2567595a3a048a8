// Device client: FETCH queries, per-item iPATCH batches, PUT and POST over a
// transport, with block-wise transfer in both directions.
//
// One request is in flight at a time. Patch items are sent strictly in
// order, one message each, so every item's outcome is known before the next
// is sent.

use std::time::{Duration, Instant};

use log::{debug, info, warn};
use serde_json::Value as Json;

use crate::coap::block::{self, Block, BlockDirection};
use crate::coap::option;
use crate::coap::{Code, Message, MessageType, RequestKind, RequestProfile, check_response};
use crate::config::ClientOptions;
use crate::converter::Converter;
use crate::error::{Error, ProtocolError, Result, TransportError};
use crate::instance_id::InstancePath;
use crate::transform::{Detransformed, QueryInput};
use crate::transport::{Endpoint, Transport};

// ---------------------------------------------------------------------------
// Batch reporting
// ---------------------------------------------------------------------------

/// What happened to one patch item.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemStatus {
    /// The device accepted the item with this 2.xx code.
    Applied(Code),
    /// The device answered with a non-success code.
    Rejected(ProtocolError),
    /// The item could not be encoded (unknown node, bad value); nothing was sent.
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ItemOutcome {
    pub path: String,
    pub status: ItemStatus,
}

impl ItemOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.status, ItemStatus::Applied(_))
    }
}

/// Result of a patch batch.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BatchReport {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub outcomes: Vec<ItemOutcome>,
}

impl BatchReport {
    fn record(&mut self, path: String, status: ItemStatus) {
        self.total += 1;
        match status {
            ItemStatus::Applied(_) => self.succeeded += 1,
            _ => self.failed += 1,
        }
        self.outcomes.push(ItemOutcome { path, status });
    }

    pub fn all_failed(&self) -> bool {
        self.total > 0 && self.succeeded == 0
    }

    pub fn is_complete(&self) -> bool {
        self.failed == 0
    }
}

/// Result of [`Client::execute`].
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Fetched(Detransformed),
    Patched(BatchReport),
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct Client<'c, T: Transport> {
    transport: T,
    converter: &'c Converter,
    options: ClientOptions,
    profile: RequestProfile,
    next_mid: u16,
}

impl<'c, T: Transport> Client<'c, T> {
    pub fn new(transport: T, converter: &'c Converter, options: ClientOptions) -> Self {
        Self {
            transport,
            converter,
            profile: options.profile(),
            options,
            next_mid: rand::random(),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Connect and wait until the device answers.
    pub fn connect(&mut self, endpoint: &Endpoint) -> Result<()> {
        self.transport.connect(endpoint)?;
        self.transport.wait_for_ready(self.options.ready_timeout)?;
        info!("connected to {endpoint}");
        Ok(())
    }

    pub fn disconnect(&mut self) {
        self.transport.disconnect();
    }

    /// Run a detected query input: bare paths are fetched, path/value pairs
    /// are patched.
    pub fn execute(&mut self, input: &QueryInput) -> Result<Outcome> {
        match input {
            QueryInput::Paths(paths) => self.fetch(paths).map(Outcome::Fetched),
            QueryInput::Patches(items) => self.patch(items).map(Outcome::Patched),
        }
    }

    /// FETCH the given instances.
    pub fn fetch(&mut self, paths: &[InstancePath]) -> Result<Detransformed> {
        let payload = self.converter.encode_query(paths)?;
        let (response, body) = self.request(RequestKind::Query, payload)?;
        check_response(&response, &self.profile.formats)?;
        let kind = self.profile.formats.classify(response.content_format());
        self.converter.decode_payload(kind, &body)
    }

    /// Apply patch items one message at a time.
    ///
    /// Per-item failures (encoding errors, error responses) are recorded in
    /// the report. Transport failures abort the batch. If every item failed
    /// the report is returned inside `Error::BatchFailed`.
    pub fn patch(&mut self, items: &[(InstancePath, Json)]) -> Result<BatchReport> {
        let mut report = BatchReport::default();
        for (target, value) in items {
            let name = target.to_string();
            let payload = match self.converter.encode_patch(target, value) {
                Ok(p) => p,
                Err(e) => {
                    warn!("{name}: not sent: {e}");
                    report.record(name, ItemStatus::Invalid(e.to_string()));
                    continue;
                }
            };
            let (response, _) = self.request(RequestKind::Patch, payload)?;
            let status = match check_response(&response, &self.profile.formats) {
                Ok(()) => ItemStatus::Applied(response.code),
                Err(e) => {
                    warn!("{name}: {e}");
                    ItemStatus::Rejected(e)
                }
            };
            report.record(name, status);
        }

        info!(
            "patch batch: {} items, {} succeeded, {} failed",
            report.total, report.succeeded, report.failed
        );
        if report.all_failed() {
            return Err(Error::BatchFailed(report));
        }
        Ok(report)
    }

    /// PUT a whole configuration tree.
    pub fn replace(&mut self, config: &Json) -> Result<Code> {
        let payload = self.converter.encode_datastore(config)?;
        let (response, _) = self.request(RequestKind::Replace, payload)?;
        check_response(&response, &self.profile.formats)?;
        Ok(response.code)
    }

    /// POST an RPC/action input and decode its output.
    pub fn invoke(&mut self, target: &InstancePath, input: &Json) -> Result<Detransformed> {
        let payload = self.converter.encode_patch(target, input)?;
        let (response, body) = self.request(RequestKind::Invoke, payload)?;
        check_response(&response, &self.profile.formats)?;
        let kind = self.profile.formats.classify(response.content_format());
        self.converter.decode_payload(kind, &body)
    }

    // -----------------------------------------------------------------------
    // Request machinery
    // -----------------------------------------------------------------------

    fn message_id(&mut self) -> u16 {
        self.next_mid = self.next_mid.wrapping_add(1);
        self.next_mid
    }

    /// Fresh random token per logical request. Replies are paired by token
    /// alone, so one token must not give away the next.
    fn token(&self) -> [u8; 4] {
        rand::random()
    }

    /// First exchange of a message. FETCH and iPATCH go through the
    /// transport's query and patch hooks.
    fn exchange(&mut self, code: Code, bytes: &[u8], timeout: Duration) -> Result<Vec<u8>> {
        let raw = match code {
            Code::FETCH => self.transport.send_query(bytes, timeout)?,
            Code::IPATCH => self.transport.send_patch(bytes, timeout)?,
            _ => {
                self.transport.send(bytes)?;
                self.transport.receive(timeout)?
            }
        };
        Ok(raw)
    }

    /// Send one logical request. Oversized payloads go out in Block1 chunks;
    /// a Block2 response is followed up until complete. Returns the last
    /// response and the reassembled response payload.
    fn request(&mut self, kind: RequestKind, payload: Vec<u8>) -> Result<(Message, Vec<u8>)> {
        let token = self.token();
        let szx = self.profile.block_szx;

        let (mut response, template) = if payload.len() > 16usize << szx {
            let (response, mut last) = self.send_block1(kind, &token, &payload, szx)?;
            last.payload.clear();
            last.remove_option(option::BLOCK1);
            (response, last)
        } else {
            let mid = self.message_id();
            let msg = self.profile.build(kind, mid, &token, payload);
            (self.round_trip(&msg)?, msg)
        };

        let mut body = std::mem::take(&mut response.payload);
        let mut expected = 0u32;
        while let Some(b2) = response.block(BlockDirection::Response)? {
            if b2.num != expected {
                return Err(TransportError::Mismatch(format!(
                    "expected response block {expected}, got {}",
                    b2.num
                ))
                .into());
            }
            if !b2.more || !response.code.is_success() {
                break;
            }
            expected += 1;
            let next = Block::new(expected, false, b2.szx)?;
            let mid = self.message_id();
            let msg = self.profile.next_block_request(&template, mid, next);
            debug!("requesting response block {expected}");
            response = self.round_trip(&msg)?;
            body.append(&mut response.payload);
        }
        Ok((response, body))
    }

    /// Send `payload` in Block1 chunks, each acknowledged with 2.31 Continue.
    /// Returns the final response and the last message sent.
    fn send_block1(
        &mut self,
        kind: RequestKind,
        token: &[u8],
        payload: &[u8],
        szx: u8,
    ) -> Result<(Message, Message)> {
        let chunks = block::split_payload(payload, szx)?;
        let count = chunks.len();
        debug!("sending {} bytes in {count} request blocks", payload.len());
        for (i, (b1, chunk)) in chunks.into_iter().enumerate() {
            let mid = self.message_id();
            let mut msg = self.profile.build(kind, mid, token, chunk.to_vec());
            msg.add_option(b1.to_option(BlockDirection::Request));
            // Block2 negotiation belongs on the last block only.
            if b1.more {
                msg.remove_option(option::BLOCK2);
            }
            let response = self.round_trip(&msg)?;
            if !b1.more || !response.code.is_success() {
                return Ok((response, msg));
            }
            if response.code != Code::CONTINUE {
                warn!(
                    "device answered request block {} with {} instead of 2.31",
                    b1.num, response.code
                );
                return Ok((response, msg));
            }
        }
        Err(TransportError::Mismatch(format!("no blocks produced for {count} chunks")).into())
    }

    /// Send `msg` and wait for its response, skipping unrelated datagrams and
    /// waiting through an empty ACK for a separate response.
    fn round_trip(&mut self, msg: &Message) -> Result<Message> {
        let timeout = self.options.request_timeout;
        let bytes = msg.encode()?;
        debug!(
            "-> {} mid={} {} bytes {}",
            msg.code,
            msg.message_id,
            bytes.len(),
            msg.uri_path()
        );
        let deadline = Instant::now() + timeout;
        let mut pending = Some(self.exchange(msg.code, &bytes, timeout)?);
        loop {
            let raw = match pending.take() {
                Some(raw) => raw,
                None => {
                    let left = deadline
                        .checked_duration_since(Instant::now())
                        .filter(|d| !d.is_zero())
                        .ok_or(TransportError::Timeout(timeout))?;
                    self.transport.receive(left)?
                }
            };
            let reply = match Message::decode(&raw) {
                Ok(m) => m,
                Err(e) => {
                    debug!("dropping malformed datagram: {e}");
                    continue;
                }
            };
            if reply.message_id == msg.message_id && reply.mtype == MessageType::Reset {
                return Err(TransportError::Mismatch(format!(
                    "device reset message {}",
                    msg.message_id
                ))
                .into());
            }
            if reply.code == Code::EMPTY {
                if reply.message_id == msg.message_id {
                    debug!("empty ACK for mid={}, waiting for separate response", msg.message_id);
                }
                continue;
            }
            if reply.token != msg.token {
                debug!("dropping response with foreign token (mid={})", reply.message_id);
                continue;
            }
            if reply.mtype == MessageType::Confirmable {
                let ack = Message::new(MessageType::Acknowledgement, Code::EMPTY, reply.message_id);
                self.transport.send(&ack.encode()?)?;
            }
            debug!("<- {} mid={} {} bytes", reply.code, reply.message_id, reply.payload.len());
            return Ok(reply);
        }
    }
}

//! Operation dispatch.
//!
//! Every external call names exactly one operation and carries a fixed-arity
//! argument list. Names are matched case-sensitively; an unknown name aborts
//! the call.

use crate::error::{display_id, RegistryError, Result};
use crate::events::RegistryEvent;
use crate::host::HostContext;
use crate::registry::selector::want_count;
use crate::registry::Registry;
use crate::storage::Storage;
use log::debug;
use num_bigint::BigUint;
use num_traits::ToPrimitive;
use serde_json::json;
use std::fmt;
use std::str::FromStr;

/// Argument or result value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Bytes(Vec<u8>),
    Int(BigUint),
    Bool(bool),
}

impl Value {
    pub fn bytes(v: impl AsRef<[u8]>) -> Self {
        Value::Bytes(v.as_ref().to_vec())
    }

    pub fn int(v: impl Into<BigUint>) -> Self {
        Value::Int(v.into())
    }

    /// Decode a JSON argument: strings are taken as UTF-8 bytes, unsigned
    /// numbers as integers, `{"hex": ".."}` as raw bytes and
    /// `{"int": "<decimal>"}` as integers too wide for JSON numbers.
    pub fn from_json(value: &serde_json::Value) -> std::result::Result<Self, String> {
        match value {
            serde_json::Value::String(s) => Ok(Value::Bytes(s.as_bytes().to_vec())),
            serde_json::Value::Bool(b) => Ok(Value::Bool(*b)),
            serde_json::Value::Number(n) => n
                .as_u64()
                .map(|v| Value::Int(BigUint::from(v)))
                .ok_or_else(|| format!("{} is not a non-negative integer", n)),
            serde_json::Value::Object(map) => {
                if let Some(serde_json::Value::String(h)) = map.get("hex") {
                    let raw = h.strip_prefix("0x").unwrap_or(h);
                    hex::decode(raw)
                        .map(Value::Bytes)
                        .map_err(|e| format!("bad hex {:?}: {}", h, e))
                } else if let Some(serde_json::Value::String(d)) = map.get("int") {
                    BigUint::from_str(d)
                        .map(Value::Int)
                        .map_err(|e| format!("bad integer {:?}: {}", d, e))
                } else {
                    Err(format!("unsupported argument object {}", value))
                }
            }
            other => Err(format!("unsupported argument {}", other)),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Bytes(b) => match std::str::from_utf8(b) {
                Ok(s) => json!(s),
                Err(_) => json!({ "hex": hex::encode(b) }),
            },
            Value::Int(i) => match i.to_u64() {
                Some(v) => json!(v),
                None => json!({ "int": i.to_string() }),
            },
            Value::Bool(b) => json!(b),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bytes(b) => write!(f, "{}", display_id(b)),
            Value::Int(i) => write!(f, "{}", i),
            Value::Bool(b) => write!(f, "{}", b),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Register,
    GetInfo,
    GetPeers,
    GetStoringPeers,
    GetPingTarget,
    GetFileSize,
    GetFilesNumber,
    GetFile,
    UpdateIpPort,
    ConfirmUpload,
    ConfirmUpdate,
    NotifySpaceFreed,
    NotifyVerificationTarget,
    CheckVerification,
    SendPingResult,
    DebugPrint,
    DebugClear,
    /// Accepted for compatibility with existing callers; does nothing
    /// until balance and payment handling exist
    Reserved(&'static str),
}

impl FromStr for Operation {
    type Err = RegistryError;

    fn from_str(name: &str) -> Result<Self> {
        let op = match name {
            "register" => Operation::Register,
            "getinfo" => Operation::GetInfo,
            "getpeers" => Operation::GetPeers,
            "getstoringpeers" => Operation::GetStoringPeers,
            "getpingtarget" => Operation::GetPingTarget,
            "getfilesize" => Operation::GetFileSize,
            "getfilesnumber" => Operation::GetFilesNumber,
            "getfile" => Operation::GetFile,
            "setipport" | "updateipport" => Operation::UpdateIpPort,
            "confirmupload" => Operation::ConfirmUpload,
            "confirmupdate" => Operation::ConfirmUpdate,
            "notifydelete" | "notifyspacefreed" => Operation::NotifySpaceFreed,
            "notifyverificationtarget" => Operation::NotifyVerificationTarget,
            "checkverification" => Operation::CheckVerification,
            "sendpingresult" => Operation::SendPingResult,
            "debugprint" => Operation::DebugPrint,
            "debugclear" => Operation::DebugClear,
            "addtoken" => Operation::Reserved("addtoken"),
            "confirmdownload" => Operation::Reserved("confirmdownload"),
            "prepay" => Operation::Reserved("prepay"),
            "verifyreplication" => Operation::Reserved("verifyreplication"),
            other => return Err(RegistryError::UnknownOperation(other.to_string())),
        };
        Ok(op)
    }
}

impl Operation {
    /// Canonical operation name
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Register => "register",
            Operation::GetInfo => "getinfo",
            Operation::GetPeers => "getpeers",
            Operation::GetStoringPeers => "getstoringpeers",
            Operation::GetPingTarget => "getpingtarget",
            Operation::GetFileSize => "getfilesize",
            Operation::GetFilesNumber => "getfilesnumber",
            Operation::GetFile => "getfile",
            Operation::UpdateIpPort => "updateipport",
            Operation::ConfirmUpload => "confirmupload",
            Operation::ConfirmUpdate => "confirmupdate",
            Operation::NotifySpaceFreed => "notifyspacefreed",
            Operation::NotifyVerificationTarget => "notifyverificationtarget",
            Operation::CheckVerification => "checkverification",
            Operation::SendPingResult => "sendpingresult",
            Operation::DebugPrint => "debugprint",
            Operation::DebugClear => "debugclear",
            Operation::Reserved(name) => *name,
        }
    }

    /// Accepted argument counts, `None` for any
    fn arity(&self) -> Option<(usize, usize)> {
        let range = match self {
            Operation::Register => (5, 5),
            Operation::GetInfo => (1, 1),
            Operation::GetPeers => (2, 3),
            Operation::GetStoringPeers => (1, 1),
            Operation::GetPingTarget => (1, 1),
            Operation::GetFileSize => (1, 1),
            Operation::GetFilesNumber => (1, 1),
            Operation::GetFile => (2, 2),
            Operation::UpdateIpPort => (2, 2),
            Operation::ConfirmUpload => (3, 3),
            Operation::ConfirmUpdate => (3, 3),
            Operation::NotifySpaceFreed => (3, 3),
            Operation::NotifyVerificationTarget => (2, 2),
            Operation::CheckVerification => (1, 1),
            Operation::SendPingResult => (2, 2),
            Operation::DebugPrint | Operation::DebugClear => (0, 0),
            Operation::Reserved(_) => return None,
        };
        Some(range)
    }
}

/// Typed access to a call's positional arguments
struct Args<'a> {
    op: &'static str,
    values: &'a [Value],
}

impl<'a> Args<'a> {
    fn new(op: Operation, values: &'a [Value]) -> Result<Self> {
        if let Some((min, max)) = op.arity() {
            if values.len() < min || values.len() > max {
                let expected = if min == max {
                    min.to_string()
                } else {
                    format!("{} to {}", min, max)
                };
                return Err(RegistryError::invalid_argument(
                    op.name(),
                    format!("expected {} arguments, got {}", expected, values.len()),
                ));
            }
        }
        Ok(Self {
            op: op.name(),
            values,
        })
    }

    fn mismatch(&self, pos: usize, expected: &str) -> RegistryError {
        RegistryError::invalid_argument(
            self.op,
            format!("argument {} must be {}, got {:?}", pos, expected, self.values[pos]),
        )
    }

    fn bytes(&self, pos: usize) -> Result<&'a [u8]> {
        match &self.values[pos] {
            Value::Bytes(b) => Ok(b),
            _ => Err(self.mismatch(pos, "bytes")),
        }
    }

    fn int(&self, pos: usize) -> Result<BigUint> {
        match &self.values[pos] {
            Value::Int(i) => Ok(i.clone()),
            _ => Err(self.mismatch(pos, "an integer")),
        }
    }

    fn u64(&self, pos: usize) -> Result<u64> {
        self.int(pos)?
            .to_u64()
            .ok_or_else(|| self.mismatch(pos, "an integer below 2^64"))
    }

    fn bool(&self, pos: usize) -> Result<bool> {
        match &self.values[pos] {
            Value::Bool(b) => Ok(*b),
            Value::Int(i) => Ok(*i != BigUint::from(0u8)),
            _ => Err(self.mismatch(pos, "a boolean")),
        }
    }

    /// Bytes as given, or an integer in little-endian form
    fn entropy(&self, pos: usize) -> Result<Vec<u8>> {
        match &self.values[pos] {
            Value::Bytes(b) => Ok(b.clone()),
            Value::Int(i) => Ok(i.to_bytes_le()),
            _ => Err(self.mismatch(pos, "bytes or an integer")),
        }
    }
}

fn ok() -> Vec<Value> {
    vec![Value::bytes("ok")]
}

/// Run operation `name` against `registry`.
///
/// The caller identity, timestamp and entropy come from `ctx`. A diagnostic
/// event naming the operation and its raw arguments is emitted before
/// anything else, including for unknown operations.
pub fn dispatch<S: Storage>(
    registry: &mut Registry<S>,
    ctx: &HostContext,
    name: &str,
    values: &[Value],
) -> Result<Vec<Value>> {
    registry.emit(RegistryEvent::Invoked {
        operation: name.to_string(),
        args: values.iter().map(|v| v.to_string()).collect(),
    });

    let op = Operation::from_str(name)?;
    let args = Args::new(op, values)?;

    let out = match op {
        Operation::Register => {
            let size = registry.register(
                args.bytes(0)?,
                args.int(1)?,
                args.bytes(2)?,
                args.bytes(3)?,
                args.bytes(4)?,
                &ctx.caller,
            )?;
            vec![Value::Int(size)]
        }
        Operation::GetInfo => {
            let info = registry.get_info(args.bytes(0)?)?;
            vec![
                Value::Int(info.size),
                Value::Int(info.free),
                Value::Bytes(info.api_addr),
                Value::Bytes(info.rpc_addr),
                Value::int(info.role.code()),
            ]
        }
        Operation::GetPeers => {
            // an optional third argument seeds nothing yet; selection is a
            // deterministic scan
            let min_free = args.int(0)?;
            let want = want_count(&args.int(1)?);
            registry
                .get_peers(&min_free, want)?
                .into_iter()
                .map(Value::Bytes)
                .collect()
        }
        Operation::GetStoringPeers => registry
            .get_storing_peers(args.bytes(0)?)?
            .into_iter()
            .map(Value::Bytes)
            .collect(),
        Operation::GetPingTarget => {
            let nonce = args.entropy(0)?;
            vec![Value::Bytes(registry.get_ping_target(ctx, &nonce)?)]
        }
        Operation::GetFileSize => vec![Value::Int(registry.get_file_size(args.bytes(0)?)?)],
        Operation::GetFilesNumber => {
            vec![Value::int(registry.get_files_number(args.bytes(0)?)?)]
        }
        Operation::GetFile => {
            let (file_id, size) = registry.get_file(args.bytes(0)?, args.u64(1)?)?;
            vec![Value::Bytes(file_id), Value::Int(size)]
        }
        Operation::UpdateIpPort => {
            let addr = registry.update_address(args.bytes(0)?, args.bytes(1)?, &ctx.caller)?;
            vec![Value::Bytes(addr)]
        }
        Operation::ConfirmUpload => {
            let free = registry.confirm_upload(
                args.bytes(0)?,
                args.bytes(1)?,
                args.int(2)?,
                &ctx.caller,
            )?;
            vec![Value::Int(free)]
        }
        Operation::ConfirmUpdate => {
            let free = registry.confirm_update(args.bytes(0)?, args.bytes(1)?, args.int(2)?)?;
            vec![Value::Int(free)]
        }
        Operation::NotifySpaceFreed => {
            registry.notify_space_freed(args.bytes(0)?, args.bytes(1)?, args.int(2)?)?;
            Vec::new()
        }
        Operation::NotifyVerificationTarget => {
            registry.notify_verification_target(args.bytes(0)?, args.bytes(1)?);
            Vec::new()
        }
        Operation::CheckVerification => {
            registry.check_verification(args.bytes(0)?);
            Vec::new()
        }
        Operation::SendPingResult => {
            let banned = registry.record_ping_result(args.bytes(0)?, args.bool(1)?, ctx.timestamp)?;
            vec![Value::Bool(banned)]
        }
        Operation::DebugPrint => {
            registry.debug_print()?;
            ok()
        }
        Operation::DebugClear => {
            registry.debug_clear()?;
            ok()
        }
        Operation::Reserved(name) => {
            debug!("Reserved operation {} ignored", name);
            Vec::new()
        }
    };
    Ok(out)
}

//! Native-library codec delegation.
//!
//! The bank distributes a vendor shared library (`libBriEcrLibrary.so`,
//! `BriEcrLibrary.dll` on Windows) whose `ecrPackRequest` and
//! `ecrParseResponse` entry points implement the same message format as
//! the pure codec. Loading happens at runtime through `libloading`, so
//! the library is optional: absence is not an error, it just means the
//! pure implementation serves all traffic.
//!
//! The C structures below mirror the bank specification appendix: flat
//! byte arrays, 200 bytes for a request and 300 for a response, no
//! padding.

use crate::request::PackedFields;
use crate::response::{
    ParsedResponse, clean_field, format_date, format_display_amount, format_time, split_filler,
};
use ecrsim_core::constants::{CARD_FIELD_LEN, REQUEST_FRAME_LEN, RESPONSE_FRAME_LEN};
use ecrsim_core::{Error, Result};
use libloading::Library;
use std::ffi::c_int;
use std::path::PathBuf;
use tracing::debug;

#[cfg(windows)]
const LIBRARY_NAME: &str = "BriEcrLibrary.dll";
#[cfg(not(windows))]
const LIBRARY_NAME: &str = "libBriEcrLibrary.so";

/// Environment variable that prepends a directory to the library search.
const LIBRARY_DIR_ENV: &str = "ECR_LIBRARY_DIR";

/// Request structure passed to `ecrPackRequest` (200 bytes).
#[repr(C)]
struct RawRequest {
    trans_type: u8,
    amount: [u8; 12],
    add_amount: [u8; 12],
    invoice_no: [u8; 12],
    card_no: [u8; CARD_FIELD_LEN],
    filler: [u8; 144],
}

/// Response structure filled by `ecrParseResponse` (300 bytes).
#[repr(C)]
struct RawResponse {
    trans_type: u8,
    tid: [u8; 8],
    mid: [u8; 15],
    batch_number: [u8; 6],
    issuer_name: [u8; 25],
    trace_no: [u8; 6],
    invoice_no: [u8; 6],
    entry_mode: u8,
    trans_amount: [u8; 12],
    total_amount: [u8; 12],
    card_no: [u8; CARD_FIELD_LEN],
    cardholder_name: [u8; 26],
    date: [u8; 8],
    time: [u8; 6],
    approval_code: [u8; 8],
    response_code: [u8; 2],
    ref_number: [u8; 12],
    balance_prepaid: [u8; 12],
    topup_card_no: [u8; CARD_FIELD_LEN],
    trans_add_amount: [u8; 12],
    filler: [u8; 84],
}

type GetVersionFn = unsafe extern "C" fn(*mut u8);
type PackRequestFn = unsafe extern "C" fn(*mut u8, *const RawRequest) -> c_int;
type ParseResponseFn = unsafe extern "C" fn(*const u8, *mut RawResponse) -> c_int;

/// Codec backed by the vendor shared library.
pub struct NativeCodec {
    library: Library,
}

impl NativeCodec {
    /// Locate and load the vendor library.
    ///
    /// Search order: `$ECR_LIBRARY_DIR`, the current directory, the system
    /// loader path.
    ///
    /// # Errors
    /// Returns `Error::Config` when the library cannot be loaded or is
    /// missing the expected entry points.
    pub fn load() -> Result<Self> {
        let mut candidates: Vec<PathBuf> = Vec::new();
        if let Ok(dir) = std::env::var(LIBRARY_DIR_ENV) {
            candidates.push(PathBuf::from(dir).join(LIBRARY_NAME));
        }
        candidates.push(PathBuf::from(LIBRARY_NAME));

        for path in &candidates {
            // SAFETY: the vendor library's initialization has no side
            // effects beyond registering its export table.
            match unsafe { Library::new(path) } {
                Ok(library) => {
                    debug!(path = %path.display(), "loaded vendor codec library");
                    let codec = NativeCodec { library };
                    codec.check_symbols()?;
                    return Ok(codec);
                }
                Err(e) => debug!(path = %path.display(), "vendor library not loadable: {e}"),
            }
        }

        Err(Error::Config(format!("{LIBRARY_NAME} not found")))
    }

    fn check_symbols(&self) -> Result<()> {
        // SAFETY: symbol lookup only; nothing is called here.
        unsafe {
            self.library
                .get::<PackRequestFn>(b"ecrPackRequest\0")
                .map_err(|e| Error::Config(format!("missing ecrPackRequest: {e}")))?;
            self.library
                .get::<ParseResponseFn>(b"ecrParseResponse\0")
                .map_err(|e| Error::Config(format!("missing ecrParseResponse: {e}")))?;
        }
        Ok(())
    }

    /// Library version string, for startup logging.
    ///
    /// # Errors
    /// Returns `Error::Config` when the version entry point is absent.
    pub fn version(&self) -> Result<String> {
        let mut buffer = [0u8; 20];
        // SAFETY: ecrGetVersion writes a NUL-terminated ASCII string of at
        // most 20 bytes into the caller's buffer.
        unsafe {
            let get_version = self
                .library
                .get::<GetVersionFn>(b"ecrGetVersion\0")
                .map_err(|e| Error::Config(format!("missing ecrGetVersion: {e}")))?;
            get_version(buffer.as_mut_ptr());
        }
        Ok(clean_field(&buffer))
    }

    /// Pack validated request fields through the vendor library.
    ///
    /// # Errors
    /// Returns `Error::Config` when the library rejects the request; the
    /// caller falls back to the pure codec.
    pub fn pack(&self, fields: &PackedFields) -> Result<Vec<u8>> {
        let mut raw = RawRequest {
            trans_type: fields.trans_code,
            amount: [0; 12],
            add_amount: [0; 12],
            invoice_no: [0; 12],
            card_no: fields.card_field(),
            filler: [0; 144],
        };
        raw.amount.copy_from_slice(fields.amount.as_bytes());
        raw.add_amount.copy_from_slice(fields.add_amount.as_bytes());
        raw.invoice_no.copy_from_slice(fields.invoice_no.as_bytes());

        let mut buffer = [0u8; REQUEST_FRAME_LEN];
        // SAFETY: the buffer holds the maximum frame the library produces
        // (205 bytes) and raw is the 200-byte layout it expects.
        let written = unsafe {
            let pack = self
                .library
                .get::<PackRequestFn>(b"ecrPackRequest\0")
                .map_err(|e| Error::Config(format!("missing ecrPackRequest: {e}")))?;
            pack(buffer.as_mut_ptr(), &raw)
        };

        if written < 0 || written as usize > buffer.len() {
            return Err(Error::Config(format!("ecrPackRequest returned {written}")));
        }
        Ok(buffer[..written as usize].to_vec())
    }

    /// Parse a framed response through the vendor library.
    ///
    /// Field post-processing (trimming, amount/date/time display shaping,
    /// the filler/QR split) is identical to the pure codec so the two
    /// implementations stay observably equivalent.
    ///
    /// # Errors
    /// Returns `Error::Config` when the library rejects the frame; the
    /// caller falls back to the pure codec.
    pub fn parse(&self, bytes: &[u8]) -> Result<ParsedResponse> {
        let mut raw = RawResponse {
            trans_type: 0,
            tid: [0; 8],
            mid: [0; 15],
            batch_number: [0; 6],
            issuer_name: [0; 25],
            trace_no: [0; 6],
            invoice_no: [0; 6],
            entry_mode: 0,
            trans_amount: [0; 12],
            total_amount: [0; 12],
            card_no: [0; CARD_FIELD_LEN],
            cardholder_name: [0; 26],
            date: [0; 8],
            time: [0; 6],
            approval_code: [0; 8],
            response_code: [0; 2],
            ref_number: [0; 12],
            balance_prepaid: [0; 12],
            topup_card_no: [0; CARD_FIELD_LEN],
            trans_add_amount: [0; 12],
            filler: [0; 84],
        };

        // SAFETY: the library reads exactly one frame from the buffer and
        // fills the 300-byte response layout.
        let ret = unsafe {
            let parse = self
                .library
                .get::<ParseResponseFn>(b"ecrParseResponse\0")
                .map_err(|e| Error::Config(format!("missing ecrParseResponse: {e}")))?;
            parse(bytes.as_ptr(), &mut raw)
        };
        if ret != 0 {
            return Err(Error::Config(format!("ecrParseResponse returned {ret}")));
        }

        let (filler, qr_code) = split_filler(clean_field(&raw.filler));
        let trailing = if bytes.len() > RESPONSE_FRAME_LEN {
            bytes[RESPONSE_FRAME_LEN..].to_vec()
        } else {
            Vec::new()
        };

        Ok(ParsedResponse {
            trans_type: format!("{:02X}", raw.trans_type),
            tid: clean_field(&raw.tid),
            mid: clean_field(&raw.mid),
            batch_number: clean_field(&raw.batch_number),
            issuer_name: clean_field(&raw.issuer_name),
            trace_no: clean_field(&raw.trace_no),
            invoice_no: clean_field(&raw.invoice_no),
            entry_mode: if raw.entry_mode == 0 {
                String::new()
            } else {
                (raw.entry_mode as char).to_string()
            },
            trans_amount: format_display_amount(&clean_field(&raw.trans_amount)),
            total_amount: format_display_amount(&clean_field(&raw.total_amount)),
            card_no: clean_field(&raw.card_no),
            cardholder_name: clean_field(&raw.cardholder_name),
            date: format_date(&clean_field(&raw.date)),
            time: format_time(&clean_field(&raw.time)),
            approval_code: clean_field(&raw.approval_code),
            response_code: clean_field(&raw.response_code),
            ref_number: clean_field(&raw.ref_number),
            balance_prepaid: format_display_amount(&clean_field(&raw.balance_prepaid)),
            topup_card_no: clean_field(&raw.topup_card_no),
            trans_add_amount: format_display_amount(&clean_field(&raw.trans_add_amount)),
            filler,
            qr_code,
            trailing,
        })
    }
}

//! Shared helpers for codec integration tests.

use ecrsim_protocol::build_frame;

/// Field-by-field builder for synthetic device responses.
///
/// Produces the 300-byte response payload with every field at its wire
/// offset, NUL-padded, ready to be framed. Defaults to an approved SALE.
pub struct ResponseBuilder {
    payload: [u8; 300],
}

impl ResponseBuilder {
    pub fn new() -> Self {
        let mut builder = ResponseBuilder { payload: [0u8; 300] };
        builder.payload[0] = 0x01;
        builder.set(159, 2, "00"); // response code: approved
        builder
    }

    fn set(&mut self, offset: usize, len: usize, value: &str) {
        let bytes = value.as_bytes();
        assert!(bytes.len() <= len, "field value longer than wire field");
        self.payload[offset..offset + bytes.len()].copy_from_slice(bytes);
        for b in &mut self.payload[offset + bytes.len()..offset + len] {
            *b = 0;
        }
    }

    pub fn trans_type(mut self, code: u8) -> Self {
        self.payload[0] = code;
        self
    }

    pub fn tid(mut self, v: &str) -> Self {
        self.set(1, 8, v);
        self
    }

    pub fn mid(mut self, v: &str) -> Self {
        self.set(9, 15, v);
        self
    }

    pub fn batch_number(mut self, v: &str) -> Self {
        self.set(24, 6, v);
        self
    }

    pub fn issuer_name(mut self, v: &str) -> Self {
        self.set(30, 25, v);
        self
    }

    pub fn trace_no(mut self, v: &str) -> Self {
        self.set(55, 6, v);
        self
    }

    pub fn invoice_no(mut self, v: &str) -> Self {
        self.set(61, 6, v);
        self
    }

    pub fn entry_mode(mut self, v: u8) -> Self {
        self.payload[67] = v;
        self
    }

    pub fn trans_amount(mut self, v: &str) -> Self {
        self.set(68, 12, v);
        self
    }

    pub fn total_amount(mut self, v: &str) -> Self {
        self.set(80, 12, v);
        self
    }

    pub fn card_no(mut self, v: &str) -> Self {
        self.set(92, 19, v);
        self
    }

    pub fn cardholder_name(mut self, v: &str) -> Self {
        self.set(111, 26, v);
        self
    }

    pub fn date(mut self, v: &str) -> Self {
        self.set(137, 8, v);
        self
    }

    pub fn time(mut self, v: &str) -> Self {
        self.set(145, 6, v);
        self
    }

    pub fn approval_code(mut self, v: &str) -> Self {
        self.set(151, 8, v);
        self
    }

    pub fn response_code(mut self, v: &str) -> Self {
        self.set(159, 2, v);
        self
    }

    pub fn ref_number(mut self, v: &str) -> Self {
        self.set(161, 12, v);
        self
    }

    pub fn balance_prepaid(mut self, v: &str) -> Self {
        self.set(173, 12, v);
        self
    }

    pub fn filler(mut self, v: &str) -> Self {
        self.set(216, 84, v);
        self
    }

    /// Frame the payload into the complete 305-byte response.
    pub fn build(self) -> Vec<u8> {
        build_frame(&self.payload)
    }

    /// Frame the payload and corrupt the LRC byte.
    pub fn build_with_bad_lrc(self) -> Vec<u8> {
        let mut frame = self.build();
        frame[304] ^= 0xFF;
        frame
    }
}

//! Fixed-length request check applied before a handler runs
use super::constants::*;
use super::error::{AttError, AttResult};

/// Permitted payload lengths (opcode byte excluded) for fixed-size requests.
///
/// Requests that carry a variable-length value are not listed; their shape
/// is checked while unpacking.
const PDU_LENGTHS: &[(u8, usize, Option<usize>)] = &[
    (ATT_EXCHANGE_MTU_REQ, ATT_EXCHANGE_MTU_REQ_LEN, None),
    (ATT_FIND_INFO_REQ, ATT_FIND_INFO_REQ_LEN, None),
    (
        ATT_READ_BY_TYPE_REQ,
        ATT_READ_BY_TYPE_REQ_LEN_16,
        Some(ATT_READ_BY_TYPE_REQ_LEN_128),
    ),
    (ATT_READ_REQ, ATT_READ_REQ_LEN, None),
    (ATT_READ_BLOB_REQ, ATT_READ_BLOB_REQ_LEN, None),
    (
        ATT_READ_BY_GROUP_TYPE_REQ,
        ATT_READ_BY_GROUP_REQ_LEN_16,
        Some(ATT_READ_BY_GROUP_REQ_LEN_128),
    ),
    (ATT_EXECUTE_WRITE_REQ, ATT_EXECUTE_WRITE_REQ_LEN, None),
];

/// Look up the permitted payload lengths for `opcode`
pub fn permitted_lengths(opcode: u8) -> Option<(usize, Option<usize>)> {
    PDU_LENGTHS
        .iter()
        .find(|(op, _, _)| *op == opcode)
        .map(|&(_, len1, len2)| (len1, len2))
}

/// Check a request payload length against the table.
///
/// Opcodes absent from the table always pass.
pub fn validate_pdu_len(opcode: u8, payload_len: usize) -> AttResult<()> {
    match permitted_lengths(opcode) {
        Some((len1, len2)) if payload_len != len1 && Some(payload_len) != len2 => {
            Err(AttError::InvalidPdu)
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ATT_EXCHANGE_MTU_REQ, 2, true)]
    #[case(ATT_EXCHANGE_MTU_REQ, 3, false)]
    #[case(ATT_FIND_INFO_REQ, 4, true)]
    #[case(ATT_FIND_INFO_REQ, 0, false)]
    #[case(ATT_READ_BY_TYPE_REQ, 6, true)]
    #[case(ATT_READ_BY_TYPE_REQ, 20, true)]
    #[case(ATT_READ_BY_TYPE_REQ, 8, false)]
    #[case(ATT_READ_REQ, 2, true)]
    #[case(ATT_READ_BLOB_REQ, 3, false)]
    #[case(ATT_READ_BY_GROUP_TYPE_REQ, 20, true)]
    #[case(ATT_READ_BY_GROUP_TYPE_REQ, 19, false)]
    #[case(ATT_EXECUTE_WRITE_REQ, 1, true)]
    #[case(ATT_EXECUTE_WRITE_REQ, 2, false)]
    #[case(ATT_WRITE_REQ, 200, true)]
    #[case(ATT_READ_MULTIPLE_REQ, 1, true)]
    fn pdu_length_table(#[case] opcode: u8, #[case] len: usize, #[case] ok: bool) {
        assert_eq!(validate_pdu_len(opcode, len).is_ok(), ok);
    }
}

use super::IdentifierError;

/// Prefix shared by every public jam COSMID
pub const PUBLIC_JAM_PREFIX: &str = "jam_";
/// Width of the legacy `band##########` database ids the importer expects
pub const EXPORT_ID_LENGTH: usize = 14;

const EXPORT_ID_TAG: &str = "band";

pub fn is_public_jam(jam: &str) -> bool {
    jam.starts_with(PUBLIC_JAM_PREFIX)
}

/// Derive the identifier an exported jam is known by.
///
/// Exported ids must not collide with ids from the original platform, so
///  public jams get a fresh `band` id built from the server code and the
///  COSMID, eg. `band` + `csmx` + `jam001` = `bandcsmxjam001`. The result
///  must keep the 14 character width of the original ids.
///
/// Personal jams are prefixed with the server code instead, and have
///  no fixed width.
pub fn derive_export_id(jam: &str, server_code: &str) -> Result<String, IdentifierError> {
    if jam.is_empty() {
        return Err(IdentifierError::Empty);
    }

    let server_code = server_code.to_lowercase();

    if !is_public_jam(jam) {
        return Ok(format!("{}_{}", server_code, jam.to_lowercase()));
    }

    let suffix = jam.replace(PUBLIC_JAM_PREFIX, "jam").to_lowercase();
    let export_id = format!("{}{}{}", EXPORT_ID_TAG, server_code, suffix);
    if export_id.len() != EXPORT_ID_LENGTH {
        return Err(IdentifierError::SchemaMismatch {
            len: export_id.len(),
            id: export_id,
            expected: EXPORT_ID_LENGTH,
        });
    }

    Ok(export_id)
}

/// Characters that are unsafe in file names on at least one platform
const PATH_HAZARDS: [char; 11] = ['/', '?', '<', '>', '\\', ':', '*', '|', '"', '~', '.'];

fn is_control(c: char) -> bool {
    matches!(c as u32, 0x00..=0x1f | 0x80..=0x9f)
}

fn is_breaking_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n')
}

/// Turn a display name into something safe to use inside a file name.
///
/// Control code points and path hazards become `replacement`, as does
///  whitespace unless `allow_whitespace` is set. A name ending in whitespace
///  gets a trailing `_` so the result never ends in (or with a replacement
///  of) a space. The result is lowercased.
pub fn sanitize_name_for_path(source: &str, replacement: char, allow_whitespace: bool) -> String {
    let mut dest = String::with_capacity(source.len() + 1);
    let mut ends_with_whitespace = false;

    for c in source.chars() {
        let mut c = c;
        if is_control(c) || PATH_HAZARDS.contains(&c) {
            c = replacement;
        }

        if is_breaking_whitespace(c) {
            if !allow_whitespace {
                c = replacement;
            }
            ends_with_whitespace = true;
        } else {
            ends_with_whitespace = false;
        }

        dest.push(c);
    }

    if ends_with_whitespace {
        dest.push('_');
    }

    // per code point, no final-sigma context
    dest.chars().flat_map(char::to_lowercase).collect()
}

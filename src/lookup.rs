//! Finding records for a queried name.
//!
//! Resolution happens in two steps, both operating on a [`Snapshot`]
//! without changing it.
//!
//! First, [`split_name`] finds the zone a name belongs to. It strips
//! labels off the front of the name until what is left is the name of a
//! zone. The stripped labels form the residual, the name of the record
//! relative to that zone.
//!
//! Second, [`find_records`] collects the records of the requested type
//! whose name is the residual, using `@` for the apex. If there are none,
//! it strips labels off the front of the residual one by one and looks for
//! wildcard records `*.<rest>` instead, ending with a bare `*` which
//! covers the whole zone.
//!
//! Names are compared ignoring ASCII case. A trailing dot on the queried
//! name is ignored.

use crate::store::{Id, Record, RecordType, Snapshot, Zone};

//------------ LookupInfo ----------------------------------------------------

/// The zone a name belongs to and the name relative to it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LookupInfo<'a> {
    pub zone_id: &'a Id,
    pub zone: &'a Zone,

    /// The labels in front of the zone name, joined by dots.
    ///
    /// This is empty for the zone apex.
    pub residual: String,
}

//------------ split_name ----------------------------------------------------

/// Finds the zone for a fully qualified name.
///
/// Returns `None` if no zone name is a suffix of `name`.
pub fn split_name<'a>(
    snapshot: &'a Snapshot,
    name: &str,
) -> Option<LookupInfo<'a>> {
    let name = trim_root(name);
    if name.is_empty() {
        return None;
    }
    let labels: Vec<&str> = name.split('.').collect();
    for start in 0..labels.len() {
        let candidate = labels[start..].join(".");
        if let Some((zone_id, zone)) = snapshot.zone_by_name(&candidate) {
            return Some(LookupInfo {
                zone_id,
                zone,
                residual: labels[..start].join("."),
            });
        }
    }
    None
}

//------------ find_records --------------------------------------------------

/// Returns the records of type `rtype` matching a residual name.
///
/// Exact matches win over wildcards; the most specific wildcard wins over
/// less specific ones. The records keep their stored names.
pub fn find_records(
    snapshot: &Snapshot,
    info: &LookupInfo,
    rtype: RecordType,
) -> Vec<Record> {
    let candidates: Vec<&Record> = snapshot
        .records_of_zone(info.zone_id)
        .map(|(_, record)| record)
        .filter(|record| record.record_type() == rtype)
        .collect();

    let exact = if info.residual.is_empty() {
        "@"
    } else {
        info.residual.as_str()
    };
    let mut found = named(&candidates, exact);

    let labels: Vec<&str> = info.residual.split('.').collect();
    let mut rest = labels.as_slice();
    while found.is_empty() && !rest.is_empty() {
        rest = &rest[1..];
        let wildcard = if rest.is_empty() {
            String::from("*")
        } else {
            format!("*.{}", rest.join("."))
        };
        found = named(&candidates, &wildcard);
    }
    found
}

fn named(candidates: &[&Record], name: &str) -> Vec<Record> {
    candidates
        .iter()
        .filter(|record| record.name.eq_ignore_ascii_case(name))
        .map(|record| Record::clone(record))
        .collect()
}

//------------ resolve -------------------------------------------------------

/// Resolves a name and type against a snapshot.
///
/// The returned records carry the queried name instead of their stored
/// name. If no zone or no record matches, the result is empty.
pub fn resolve(
    snapshot: &Snapshot,
    name: &str,
    rtype: RecordType,
) -> Vec<Record> {
    let Some(info) = split_name(snapshot, name) else {
        return Vec::new();
    };
    let mut records = find_records(snapshot, &info, rtype);
    for record in &mut records {
        record.name = name.into();
    }
    records
}

//------------ Helpers -------------------------------------------------------

/// Removes a single trailing dot.
pub(crate) fn trim_root(name: &str) -> &str {
    name.strip_suffix('.').unwrap_or(name)
}

/// Returns whether `name` equals `domain` or is below it.
pub(crate) fn is_within(name: &str, domain: &str) -> bool {
    let name = trim_root(name);
    let domain = trim_root(domain);
    if domain.is_empty() {
        return false;
    }
    if name.len() == domain.len() {
        return name.eq_ignore_ascii_case(domain);
    }
    name.len() > domain.len()
        && name.as_bytes()[name.len() - domain.len() - 1] == b'.'
        && name[name.len() - domain.len()..].eq_ignore_ascii_case(domain)
}

/// Returns the last label of a name.
pub(crate) fn top_label(name: &str) -> &str {
    let name = trim_root(name);
    name.rsplit('.').next().unwrap_or(name)
}

//============ Testing =======================================================

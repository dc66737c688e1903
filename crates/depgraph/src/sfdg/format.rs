//! Binary reader/writer for the SFDG on-disk format (spec §4.D).
//!
//! Little-endian, block-structured: a flat stream of
//! `(code: u8, payload...)` records. Five record *kinds* are recognized;
//! the `PROVIDES_*`/`DEPENDS_*` kind is actually a family of one record
//! code per designator tag sharing a payload shape.
//!
//! No reference corpus for the exact tag values shipped with this pack
//! (see SPEC_FULL.md §5, Open Question 1): the values below are this
//! implementation's own external contract, chosen to be internally
//! consistent and exercised by the round-trip tests in `tests/`.

use super::{Role, Sfdg, SfdgNode};
use crate::error::{Error, Result};
use crate::interner::{StringId, StringTable};
use crate::key::{Aspect, DependencyKey, Designator};
use std::io::{Cursor, Read, Write};
use std::path::Path;

pub const FORMAT_MAJOR: u32 = 1;
pub const FORMAT_MINOR: u32 = 0;

const REC_METADATA: u8 = 1;
const REC_SOURCE_FILE_NODE: u8 = 2;
const REC_FINGERPRINT_NODE: u8 = 3;
const REC_IDENTIFIER: u8 = 4;

const REC_PROVIDES_TOP_LEVEL: u8 = 10;
const REC_DEPENDS_TOP_LEVEL: u8 = 11;
const REC_PROVIDES_NOMINAL: u8 = 12;
const REC_DEPENDS_NOMINAL: u8 = 13;
const REC_PROVIDES_POTENTIAL_MEMBER: u8 = 14;
const REC_DEPENDS_POTENTIAL_MEMBER: u8 = 15;
const REC_PROVIDES_MEMBER: u8 = 16;
const REC_DEPENDS_MEMBER: u8 = 17;
const REC_PROVIDES_DYNAMIC_LOOKUP: u8 = 18;
const REC_DEPENDS_DYNAMIC_LOOKUP: u8 = 19;
const REC_PROVIDES_EXTERNAL_DEPEND: u8 = 20;
const REC_DEPENDS_EXTERNAL_DEPEND: u8 = 21;

const ASPECT_INTERFACE: u8 = 0;
const ASPECT_IMPLEMENTATION: u8 = 1;

fn aspect_to_byte(a: Aspect) -> u8 {
    match a {
        Aspect::Interface => ASPECT_INTERFACE,
        Aspect::Implementation => ASPECT_IMPLEMENTATION,
    }
}

fn byte_to_aspect(path: &Path, b: u8) -> Result<Aspect> {
    match b {
        ASPECT_INTERFACE => Ok(Aspect::Interface),
        ASPECT_IMPLEMENTATION => Ok(Aspect::Implementation),
        other => Err(Error::MalformedBlock {
            path: path.to_path_buf(),
            reason: format!("invalid aspect byte {other}"),
        }),
    }
}

/// Write `sfdg` to a byte vector. Guaranteed to round-trip through
/// `read` to an isomorphic graph (spec §8 round-trip law).
pub fn write(sfdg: &Sfdg) -> Vec<u8> {
    let mut out = Vec::new();

    write_record(&mut out, REC_METADATA, |buf| {
        write_u32(buf, FORMAT_MAJOR);
        write_u32(buf, FORMAT_MINOR);
        write_u32(buf, StringId::EMPTY.index() as u32);
    });

    // Every identifier the node records will reference must be emitted
    // before its first use; emit the whole pool up front (skipping the
    // reserved empty-string slot 0, which the reader seeds itself).
    for (idx, s) in sfdg.strings.iter().enumerate().skip(1) {
        write_record(&mut out, REC_IDENTIFIER, |buf| {
            write_u32(buf, idx as u32);
            write_blob(buf, s.as_bytes());
        });
    }

    for node in &sfdg.nodes {
        write_node(&mut out, node);
        if let Some(fp) = node.fingerprint {
            write_record(&mut out, REC_FINGERPRINT_NODE, |buf| {
                write_u32(buf, fp.index() as u32);
            });
        }
    }

    out
}

fn write_node(out: &mut Vec<u8>, node: &SfdgNode) {
    let role_byte = match node.role {
        Role::Definition => 0u8,
        Role::Use => 1u8,
    };
    match node.key.designator {
        Designator::SourceFileProvide { name } => {
            write_record(out, REC_SOURCE_FILE_NODE, |buf| {
                buf.push(aspect_to_byte(node.key.aspect));
                write_u32(buf, name.index() as u32);
                buf.push(role_byte);
            });
        }
        Designator::TopLevel { name } => write_unary(out, node, provides_code_for(&node.key.designator, node.role), name),
        Designator::Nominal { context } => write_unary(out, node, provides_code_for(&node.key.designator, node.role), context),
        Designator::PotentialMember { context } => write_unary(out, node, provides_code_for(&node.key.designator, node.role), context),
        Designator::DynamicLookup { name } => write_unary(out, node, provides_code_for(&node.key.designator, node.role), name),
        Designator::ExternalDepend { path } => write_unary(out, node, provides_code_for(&node.key.designator, node.role), path),
        Designator::Member { context, name } => {
            let code = provides_code_for(&node.key.designator, node.role);
            write_record(out, code, |buf| {
                buf.push(aspect_to_byte(node.key.aspect));
                write_u32(buf, context.index() as u32);
                write_u32(buf, name.index() as u32);
            });
        }
    }
}

fn write_unary(out: &mut Vec<u8>, node: &SfdgNode, code: u8, operand: StringId) {
    write_record(out, code, |buf| {
        buf.push(aspect_to_byte(node.key.aspect));
        write_u32(buf, operand.index() as u32);
    });
}

fn provides_code_for(designator: &Designator, role: Role) -> u8 {
    let provides = role == Role::Definition;
    match (designator, provides) {
        (Designator::TopLevel { .. }, true) => REC_PROVIDES_TOP_LEVEL,
        (Designator::TopLevel { .. }, false) => REC_DEPENDS_TOP_LEVEL,
        (Designator::Nominal { .. }, true) => REC_PROVIDES_NOMINAL,
        (Designator::Nominal { .. }, false) => REC_DEPENDS_NOMINAL,
        (Designator::PotentialMember { .. }, true) => REC_PROVIDES_POTENTIAL_MEMBER,
        (Designator::PotentialMember { .. }, false) => REC_DEPENDS_POTENTIAL_MEMBER,
        (Designator::Member { .. }, true) => REC_PROVIDES_MEMBER,
        (Designator::Member { .. }, false) => REC_DEPENDS_MEMBER,
        (Designator::DynamicLookup { .. }, true) => REC_PROVIDES_DYNAMIC_LOOKUP,
        (Designator::DynamicLookup { .. }, false) => REC_DEPENDS_DYNAMIC_LOOKUP,
        (Designator::ExternalDepend { .. }, true) => REC_PROVIDES_EXTERNAL_DEPEND,
        (Designator::ExternalDepend { .. }, false) => REC_DEPENDS_EXTERNAL_DEPEND,
        (Designator::SourceFileProvide { .. }, _) => unreachable!("handled separately"),
    }
}

fn write_record(out: &mut Vec<u8>, code: u8, payload: impl FnOnce(&mut Vec<u8>)) {
    out.push(code);
    let mut buf = Vec::new();
    payload(&mut buf);
    write_u32(out, buf.len() as u32);
    out.extend_from_slice(&buf);
}

fn write_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn write_blob(out: &mut Vec<u8>, bytes: &[u8]) {
    write_u32(out, bytes.len() as u32);
    out.extend_from_slice(bytes);
}

/// Read an SFDG from `bytes`. `path` is used only to label errors.
pub fn read(bytes: &[u8], path: impl AsRef<Path>) -> Result<Sfdg> {
    let path = path.as_ref();
    let mut cursor = Cursor::new(bytes);
    let mut strings = StringTable::new();
    let mut nodes: Vec<SfdgNode> = Vec::new();
    let mut saw_metadata = false;
    let mut pending_fingerprint_target: Option<usize> = None;

    while let Some(code) = read_u8(&mut cursor) {
        let len = read_u32(&mut cursor, path)?;
        let mut payload = vec![0u8; len as usize];
        cursor
            .read_exact(&mut payload)
            .map_err(|e| Error::io(path, e))?;
        let mut p = Cursor::new(payload.as_slice());

        match code {
            REC_METADATA => {
                let major = read_u32(&mut p, path)?;
                let _minor = read_u32(&mut p, path)?;
                let _version_str = read_u32(&mut p, path)?;
                if major != FORMAT_MAJOR {
                    return Err(Error::VersionMismatch {
                        path: path.to_path_buf(),
                        found: major,
                    });
                }
                saw_metadata = true;
            }
            REC_IDENTIFIER => {
                let idx = read_u32(&mut p, path)?;
                let blob = read_blob(&mut p, path)?;
                let s = String::from_utf8_lossy(&blob).into_owned();
                let assigned = strings.intern(&s);
                if assigned.index() as u32 != idx {
                    return Err(Error::MalformedBlock {
                        path: path.to_path_buf(),
                        reason: format!(
                            "identifier record claimed index {idx} but pool assigned {}",
                            assigned.index()
                        ),
                    });
                }
            }
            REC_SOURCE_FILE_NODE => {
                let aspect = byte_to_aspect(path, read_u8_req(&mut p, path)?)?;
                let name = read_string_id(&mut p, path, &strings)?;
                let role = role_from_byte(path, read_u8_req(&mut p, path)?)?;
                let seq = nodes.len() as u32;
                nodes.push(SfdgNode {
                    sequence: seq,
                    key: DependencyKey::source_file_provide(aspect, name),
                    fingerprint: None,
                    defs_i_depend_upon: Vec::new(),
                    role,
                });
                pending_fingerprint_target = Some(nodes.len() - 1);
            }
            REC_FINGERPRINT_NODE => {
                let idx = read_u32(&mut p, path)?;
                let fp = string_id_from_index(path, &strings, idx)?;
                let target = pending_fingerprint_target.ok_or_else(|| Error::MalformedBlock {
                    path: path.to_path_buf(),
                    reason: "FINGERPRINT_NODE with no preceding node record".to_string(),
                })?;
                nodes[target].fingerprint = Some(fp);
            }
            other => {
                let (designator_kind, provides) = designator_kind_for_code(path, other)?;
                let aspect = byte_to_aspect(path, read_u8_req(&mut p, path)?)?;
                let designator = read_designator(&mut p, path, &strings, designator_kind)?;
                let role = if provides { Role::Definition } else { Role::Use };
                let seq = nodes.len() as u32;
                nodes.push(SfdgNode {
                    sequence: seq,
                    key: DependencyKey::new(aspect, designator),
                    fingerprint: None,
                    defs_i_depend_upon: Vec::new(),
                    role,
                });
                pending_fingerprint_target = Some(nodes.len() - 1);
            }
        }
    }

    if !saw_metadata {
        return Err(Error::MalformedBlock {
            path: path.to_path_buf(),
            reason: "missing METADATA record".to_string(),
        });
    }

    let mut sfdg = Sfdg { strings, nodes };
    sfdg.resolve();
    for node in &sfdg.nodes {
        for &dep in &node.defs_i_depend_upon {
            if sfdg.nodes.get(dep as usize).is_none() {
                return Err(Error::SequenceOutOfRange {
                    path: path.to_path_buf(),
                    seq: dep,
                });
            }
        }
    }
    Ok(sfdg)
}

#[derive(Clone, Copy)]
enum DesignatorKind {
    TopLevel,
    Nominal,
    PotentialMember,
    Member,
    DynamicLookup,
    ExternalDepend,
}

fn designator_kind_for_code(path: &Path, code: u8) -> Result<(DesignatorKind, bool)> {
    Ok(match code {
        REC_PROVIDES_TOP_LEVEL => (DesignatorKind::TopLevel, true),
        REC_DEPENDS_TOP_LEVEL => (DesignatorKind::TopLevel, false),
        REC_PROVIDES_NOMINAL => (DesignatorKind::Nominal, true),
        REC_DEPENDS_NOMINAL => (DesignatorKind::Nominal, false),
        REC_PROVIDES_POTENTIAL_MEMBER => (DesignatorKind::PotentialMember, true),
        REC_DEPENDS_POTENTIAL_MEMBER => (DesignatorKind::PotentialMember, false),
        REC_PROVIDES_MEMBER => (DesignatorKind::Member, true),
        REC_DEPENDS_MEMBER => (DesignatorKind::Member, false),
        REC_PROVIDES_DYNAMIC_LOOKUP => (DesignatorKind::DynamicLookup, true),
        REC_DEPENDS_DYNAMIC_LOOKUP => (DesignatorKind::DynamicLookup, false),
        REC_PROVIDES_EXTERNAL_DEPEND => (DesignatorKind::ExternalDepend, true),
        REC_DEPENDS_EXTERNAL_DEPEND => (DesignatorKind::ExternalDepend, false),
        other => {
            return Err(Error::UnknownMandatoryRecord {
                path: path.to_path_buf(),
                code: other,
            })
        }
    })
}

fn read_designator(
    p: &mut Cursor<&[u8]>,
    path: &Path,
    strings: &StringTable,
    kind: DesignatorKind,
) -> Result<Designator> {
    Ok(match kind {
        DesignatorKind::TopLevel => Designator::TopLevel {
            name: read_string_id(p, path, strings)?,
        },
        DesignatorKind::Nominal => Designator::Nominal {
            context: read_string_id(p, path, strings)?,
        },
        DesignatorKind::PotentialMember => Designator::PotentialMember {
            context: read_string_id(p, path, strings)?,
        },
        DesignatorKind::DynamicLookup => Designator::DynamicLookup {
            name: read_string_id(p, path, strings)?,
        },
        DesignatorKind::ExternalDepend => Designator::ExternalDepend {
            path: read_string_id(p, path, strings)?,
        },
        DesignatorKind::Member => {
            let context = read_string_id(p, path, strings)?;
            let name = read_string_id(p, path, strings)?;
            Designator::Member { context, name }
        }
    })
}

fn role_from_byte(path: &Path, b: u8) -> Result<Role> {
    match b {
        0 => Ok(Role::Definition),
        1 => Ok(Role::Use),
        other => Err(Error::MalformedBlock {
            path: path.to_path_buf(),
            reason: format!("invalid role byte {other}"),
        }),
    }
}

fn read_string_id(p: &mut Cursor<&[u8]>, path: &Path, strings: &StringTable) -> Result<StringId> {
    let idx = read_u32(p, path)?;
    string_id_from_index(path, strings, idx)
}

fn string_id_from_index(path: &Path, strings: &StringTable, idx: u32) -> Result<StringId> {
    if idx as usize >= strings.len() {
        return Err(Error::StringPoolOutOfRange {
            path: path.to_path_buf(),
            index: idx,
            len: strings.len(),
        });
    }
    // SAFETY-free: StringId has no public constructor from a raw index,
    // so round-trip through intern of the known string instead.
    Ok(strings.id_at(idx as usize))
}

fn read_u8(cursor: &mut Cursor<&[u8]>) -> Option<u8> {
    let mut b = [0u8; 1];
    match cursor.read_exact(&mut b) {
        Ok(()) => Some(b[0]),
        Err(_) => None,
    }
}

fn read_u8_req(cursor: &mut Cursor<&[u8]>, path: &Path) -> Result<u8> {
    read_u8(cursor).ok_or_else(|| Error::MalformedBlock {
        path: path.to_path_buf(),
        reason: "unexpected end of record payload".to_string(),
    })
}

fn read_u32(cursor: &mut Cursor<&[u8]>, path: &Path) -> Result<u32> {
    let mut b = [0u8; 4];
    cursor.read_exact(&mut b).map_err(|_| Error::MalformedBlock {
        path: path.to_path_buf(),
        reason: "unexpected end of stream reading u32".to_string(),
    })?;
    Ok(u32::from_le_bytes(b))
}

fn read_blob(cursor: &mut Cursor<&[u8]>, path: &Path) -> Result<Vec<u8>> {
    let len = read_u32(cursor, path)?;
    let mut buf = vec![0u8; len as usize];
    cursor.read_exact(&mut buf).map_err(|e| Error::io(path, e))?;
    Ok(buf)
}

/// Write `sfdg` to `path` on disk.
pub fn write_to_file(sfdg: &Sfdg, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let bytes = write(sfdg);
    let mut f = std::fs::File::create(path).map_err(|e| Error::io(path, e))?;
    f.write_all(&bytes).map_err(|e| Error::io(path, e))?;
    Ok(())
}

/// Read an SFDG from a file on disk.
pub fn read_from_file(path: impl AsRef<Path>) -> Result<Sfdg> {
    let path_ref = path.as_ref();
    let bytes = std::fs::read(path_ref).map_err(|e| Error::io(path_ref, e))?;
    read(&bytes, path_ref)
}

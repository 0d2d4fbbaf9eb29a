//! TRE_OVERFLOW handling: moving TREs that do not fit an extension section
//! into data extension segments, and folding them back.

use crate::des::{DataExtensionSubheader, OverflowSection, OverflowTarget};
use crate::fields::OVERFLOW_INDEX_LEN;
use crate::graphic::GraphicSubheader;
use crate::header::{ComponentInfo, FileHeader};
use crate::image::ImageSubheader;
use crate::record::{Payload, Record, Segment};
use crate::security::SecurityGroup;
use crate::text::TextSubheader;
use crate::{Location, NitfError};
use log::{debug, info, warn};
use std::collections::{HashMap, HashSet};
use tre::{Extensions, Registry, Tre};

/// Most TRE bytes a single overflow segment carries.
pub const DES_TRE_LIMIT: usize = 99_999;

/// Value of a section's length field: 0 when it is empty and has no
/// overflow, otherwise the overflow index plus the encoded TREs.
pub fn section_length(section: &Extensions, has_overflow: bool) -> Result<usize, NitfError> {
    if section.is_empty() && !has_overflow {
        return Ok(0);
    }
    section
        .encoded_len()
        .map_err(|_| NitfError::SizeOverflow)?
        .checked_add(OVERFLOW_INDEX_LEN)
        .ok_or(NitfError::SizeOverflow)
}

fn location_of(target: OverflowTarget) -> Location {
    let index = (target.item as usize).saturating_sub(1);
    match target.section {
        OverflowSection::UserDefinedHeader | OverflowSection::ExtendedHeader => {
            Location::FileHeader
        }
        OverflowSection::UserDefinedImage | OverflowSection::ExtendedImage => {
            Location::Image(index)
        }
        OverflowSection::ExtendedGraphic => Location::Graphic(index),
        OverflowSection::ExtendedText => Location::Text(index),
    }
}

/// Every extension section of the record that may overflow.
fn owners(record: &Record) -> Vec<OverflowTarget> {
    let mut targets = vec![
        OverflowTarget {
            section: OverflowSection::UserDefinedHeader,
            item: 0,
        },
        OverflowTarget {
            section: OverflowSection::ExtendedHeader,
            item: 0,
        },
    ];
    for i in 0..record.images.len() {
        let item = i as u64 + 1;
        targets.push(OverflowTarget {
            section: OverflowSection::UserDefinedImage,
            item,
        });
        targets.push(OverflowTarget {
            section: OverflowSection::ExtendedImage,
            item,
        });
    }
    for i in 0..record.graphics.len() {
        targets.push(OverflowTarget {
            section: OverflowSection::ExtendedGraphic,
            item: i as u64 + 1,
        });
    }
    for i in 0..record.texts.len() {
        targets.push(OverflowTarget {
            section: OverflowSection::ExtendedText,
            item: i as u64 + 1,
        });
    }
    targets
}

type Owner<'a> = (&'a mut Extensions, &'a str, &'a SecurityGroup);

/// The section a target names, with the security markings its overflow
/// segments copy.
fn owner_section<'a>(
    header: &'a mut FileHeader,
    images: &'a mut [Segment<ImageSubheader>],
    graphics: &'a mut [Segment<GraphicSubheader>],
    texts: &'a mut [Segment<TextSubheader>],
    target: OverflowTarget,
) -> Option<Owner<'a>> {
    let index = (target.item as usize).checked_sub(1);
    match target.section {
        OverflowSection::UserDefinedHeader | OverflowSection::ExtendedHeader => {
            if target.item != 0 {
                return None;
            }
            let FileHeader {
                user_defined,
                extended,
                classification,
                security,
                ..
            } = header;
            let section = if target.section == OverflowSection::UserDefinedHeader {
                user_defined
            } else {
                extended
            };
            Some((section, classification.as_str(), &*security))
        }
        OverflowSection::UserDefinedImage | OverflowSection::ExtendedImage => {
            let ImageSubheader {
                user_defined,
                extended,
                classification,
                security,
                ..
            } = &mut images.get_mut(index?)?.subheader;
            let section = if target.section == OverflowSection::UserDefinedImage {
                user_defined
            } else {
                extended
            };
            Some((section, classification.as_str(), &*security))
        }
        OverflowSection::ExtendedGraphic => {
            let GraphicSubheader {
                extended,
                classification,
                security,
                ..
            } = &mut graphics.get_mut(index?)?.subheader;
            Some((extended, classification.as_str(), &*security))
        }
        OverflowSection::ExtendedText => {
            let TextSubheader {
                extended,
                classification,
                security,
                ..
            } = &mut texts.get_mut(index?)?.subheader;
            Some((extended, classification.as_str(), &*security))
        }
    }
}

fn overflow_target(segment: &Segment<DataExtensionSubheader>) -> Option<OverflowTarget> {
    if segment.subheader.is_overflow() {
        segment.subheader.overflow
    } else {
        None
    }
}

/// TREs held by an overflow segment. Payloads still in byte form are split
/// into raw TREs.
fn payload_tres(payload: &Payload, location: Location) -> Result<Vec<Tre>, NitfError> {
    match payload {
        Payload::Tres(tres) => Ok(tres.as_slice().to_vec()),
        Payload::Bytes(bytes) => {
            let (tres, _) = Extensions::decode_section(bytes, &Registry::new())
                .map_err(|source| NitfError::Tre { location, source })?;
            Ok(tres.into_vec())
        }
        Payload::Unread => Err(NitfError::ToWrite {
            location,
            reason: "overflow segment data has not been read".to_owned(),
        }),
    }
}

/// Decoded TREs of every data extension segment, by position. Segments that
/// are not overflow, or are unread when `skip_unread` is set, give `None`.
fn decode_overflow(record: &Record, skip_unread: bool) -> Result<Vec<Option<Vec<Tre>>>, NitfError> {
    let mut decoded = Vec::with_capacity(record.data_extensions.len());
    for (i, segment) in record.data_extensions.iter().enumerate() {
        if overflow_target(segment).is_none()
            || (skip_unread && segment.payload == Payload::Unread)
        {
            decoded.push(None);
            continue;
        }
        decoded.push(Some(payload_tres(
            &segment.payload,
            Location::DataExtension(i),
        )?));
    }
    Ok(decoded)
}

fn has_owner(record: &Record, target: OverflowTarget) -> bool {
    let item = target.item as usize;
    match target.section {
        OverflowSection::UserDefinedHeader | OverflowSection::ExtendedHeader => target.item == 0,
        OverflowSection::UserDefinedImage | OverflowSection::ExtendedImage => {
            (1..=record.images.len()).contains(&item)
        }
        OverflowSection::ExtendedGraphic => (1..=record.graphics.len()).contains(&item),
        OverflowSection::ExtendedText => (1..=record.texts.len()).contains(&item),
    }
}

/// Fails with [`TreNotRepresentable`](NitfError::TreNotRepresentable) when
/// any section or overflow segment holds a TRE too long for a DES.
fn check_representable(record: &Record, decoded: &[Option<Vec<Tre>>]) -> Result<(), NitfError> {
    let mut sections: Vec<(Location, &[Tre])> = vec![
        (Location::FileHeader, record.header.user_defined.as_slice()),
        (Location::FileHeader, record.header.extended.as_slice()),
    ];
    for (i, image) in record.images.iter().enumerate() {
        sections.push((Location::Image(i), image.subheader.user_defined.as_slice()));
        sections.push((Location::Image(i), image.subheader.extended.as_slice()));
    }
    for (i, graphic) in record.graphics.iter().enumerate() {
        sections.push((Location::Graphic(i), graphic.subheader.extended.as_slice()));
    }
    for (i, text) in record.texts.iter().enumerate() {
        sections.push((Location::Text(i), text.subheader.extended.as_slice()));
    }
    for (i, tres) in decoded.iter().enumerate() {
        if let Some(tres) = tres {
            sections.push((Location::DataExtension(i), tres.as_slice()));
        }
    }

    for (location, tres) in sections {
        if let Some(tre) = tres.iter().find(|t| t.encoded_len() > DES_TRE_LIMIT) {
            return Err(NitfError::TreNotRepresentable {
                location,
                tag: tre.tag().to_owned(),
                length: tre.encoded_len(),
            });
        }
    }
    Ok(())
}

/// Relocation loops must shrink what they have left on every step.
fn check_progress(before: usize, after: usize, location: Location) -> Result<(), NitfError> {
    if after < before {
        Ok(())
    } else {
        Err(NitfError::Internal {
            location,
            reason: format!("TRE relocation stalled with {} items left", after),
        })
    }
}

/// Shrinks `section` to the longest prefix that fits `target`'s limit and
/// packs the rest, in order, into new overflow segments.
pub fn enforce_limit(
    section: &mut Extensions,
    target: OverflowTarget,
    classification: &str,
    security: &SecurityGroup,
) -> Result<Vec<Segment<DataExtensionSubheader>>, NitfError> {
    let limit = target.section.limit();
    let location = location_of(target);
    let length = section_length(section, false)?;
    if length <= limit {
        return Ok(Vec::new());
    }

    for tre in section.iter() {
        if tre.encoded_len() > DES_TRE_LIMIT {
            return Err(NitfError::TreNotRepresentable {
                location,
                tag: tre.tag().to_owned(),
                length: tre.encoded_len(),
            });
        }
    }

    let mut used = OVERFLOW_INDEX_LEN;
    let mut keep = 0;
    for tre in section.iter() {
        match used.checked_add(tre.encoded_len()) {
            Some(next) if next <= limit => {
                used = next;
                keep += 1;
            }
            _ => break,
        }
    }
    let moved = section.split_off(keep);
    info!(
        "{} {} over {} bytes, keeping {} TREs and moving {}",
        location,
        target.section,
        limit,
        keep,
        moved.len()
    );

    let mut segments = Vec::new();
    let mut current = Extensions::new();
    let mut current_len = 0;
    let mut moved = moved.into_iter();
    let mut left = moved.len();
    while let Some(tre) = moved.next() {
        check_progress(left, moved.len(), location)?;
        left = moved.len();
        let len = tre.encoded_len();
        if !current.is_empty() && current_len + len > DES_TRE_LIMIT {
            segments.push(overflow_segment(target, classification, security, current));
            current = Extensions::new();
            current_len = 0;
        }
        current_len += len;
        current.push(tre);
    }
    if !current.is_empty() {
        segments.push(overflow_segment(target, classification, security, current));
    }
    Ok(segments)
}

fn overflow_segment(
    target: OverflowTarget,
    classification: &str,
    security: &SecurityGroup,
    tres: Extensions,
) -> Segment<DataExtensionSubheader> {
    debug!("overflow segment for {} item {}, {} TREs", target.section, target.item, tres.len());
    let mut segment = Segment::new(DataExtensionSubheader::overflow(
        target,
        classification,
        security,
    ));
    segment.payload = Payload::Tres(tres);
    segment
}

/// Removes the overflow segments of `target`, returning their TREs in
/// order. `decoded` follows the data extension list.
fn absorb(
    record: &mut Record,
    decoded: &mut Vec<Option<Vec<Tre>>>,
    target: OverflowTarget,
) -> Result<Vec<Tre>, NitfError> {
    let mut tres = Vec::new();
    let mut i = 0;
    let mut left = record.data_extensions.len().saturating_add(1);
    while i < record.data_extensions.len() {
        let now = record.data_extensions.len() - i;
        check_progress(left, now, Location::DataExtension(i))?;
        left = now;

        if overflow_target(&record.data_extensions[i]) != Some(target) {
            i += 1;
            continue;
        }
        record.data_extensions.remove(i);
        record.header.data_extensions.remove(i);
        tres.extend(decoded.remove(i).unwrap_or_default());
    }
    Ok(tres)
}

/// Applies [`enforce_limit`] to every section of the record. Overflow
/// segments already present are folded into their owner first, so applying
/// it twice gives the same record. Overflow data is decoded and checked
/// before anything moves, so a failure leaves the record as it was.
pub fn enforce_limits(record: &mut Record) -> Result<usize, NitfError> {
    record.validate_counts()?;
    info!("Overflow enforcement start, {} DES", record.data_extensions.len());
    let mut decoded = decode_overflow(record, false)?;
    check_representable(record, &decoded)?;

    for target in owners(record) {
        let absorbed = absorb(record, &mut decoded, target)?;
        let Record {
            header,
            images,
            graphics,
            texts,
            ..
        } = &mut *record;
        let (section, classification, security) =
            match owner_section(header, images, graphics, texts, target) {
                Some(owner) => owner,
                None => continue,
            };
        section.extend(absorbed);
        let created = enforce_limit(section, target, classification, security)?;
        for segment in created {
            record.header.data_extensions.push(ComponentInfo::default());
            record.data_extensions.push(segment);
            decoded.push(None);
        }
    }

    let count = record
        .data_extensions
        .iter()
        .filter(|s| overflow_target(s).is_some())
        .count();
    info!("Overflow enforcement finish, {} overflow DES", count);
    Ok(count)
}

/// Moves TREs from overflow segments back to the front of what their owner
/// may hold, deleting segments that end up empty. Once a segment keeps TREs
/// for an owner, later segments of that owner stay where they are.
pub fn reconcile(record: &mut Record) -> Result<(), NitfError> {
    record.validate_counts()?;
    info!("Overflow reconcile start");
    let mut decoded = decode_overflow(record, true)?;
    for (i, segment) in record.data_extensions.iter().enumerate() {
        if let Some(target) = overflow_target(segment) {
            if !has_owner(record, target) {
                return Err(NitfError::Structural {
                    location: Location::DataExtension(i),
                    reason: format!(
                        "overflow of {} item {} has no owner",
                        target.section, target.item
                    ),
                });
            }
        }
    }

    let mut blocked: HashSet<OverflowTarget> = HashSet::new();
    let mut i = 0;
    let mut left = record.data_extensions.len().saturating_add(1);
    while i < record.data_extensions.len() {
        let location = Location::DataExtension(i);
        let now = record.data_extensions.len() - i;
        check_progress(left, now, location)?;
        left = now;

        let target = match overflow_target(&record.data_extensions[i]) {
            Some(target) => target,
            None => {
                i += 1;
                continue;
            }
        };
        let mut pending = match decoded[i].take() {
            Some(tres) if !blocked.contains(&target) => tres,
            Some(_) => {
                debug!("{}: earlier overflow of {} still held", location, target.section);
                i += 1;
                continue;
            }
            None => {
                warn!("{}: overflow data not loaded, left in place", location);
                blocked.insert(target);
                i += 1;
                continue;
            }
        };

        let Record {
            header,
            images,
            graphics,
            texts,
            data_extensions,
            ..
        } = &mut *record;
        let (section, _, _) = owner_section(header, images, graphics, texts, target)
            .ok_or_else(|| NitfError::Structural {
                location,
                reason: format!(
                    "overflow of {} item {} has no owner",
                    target.section, target.item
                ),
            })?;

        let limit = target.section.limit();
        let mut length = section_length(section, false)?;
        let mut moved = 0;
        for tre in &pending {
            let base = if length == 0 { OVERFLOW_INDEX_LEN } else { length };
            match base.checked_add(tre.encoded_len()) {
                Some(next) if next <= limit => {
                    length = next;
                    moved += 1;
                }
                _ => break,
            }
        }
        let rest = pending.split_off(moved);
        section.extend(pending);
        debug!("{}: {} TREs returned to {}", location, moved, target.section);

        if rest.is_empty() {
            data_extensions.remove(i);
            header.data_extensions.remove(i);
            decoded.remove(i);
        } else {
            blocked.insert(target);
            if moved > 0 {
                data_extensions[i].payload = Payload::Tres(rest.into_iter().collect());
            }
            i += 1;
        }
    }
    info!("Overflow reconcile finish");
    Ok(())
}

/// Points each owner's overflow index at its first overflow segment, by
/// 1-based DES position, or 0 when it has none.
pub(crate) fn assign_overflow_indexes(record: &mut Record) {
    let mut first: HashMap<OverflowTarget, u64> = HashMap::new();
    for (i, segment) in record.data_extensions.iter().enumerate() {
        if let Some(target) = overflow_target(segment) {
            first.entry(target).or_insert(i as u64 + 1);
        }
    }
    let index = |section, item| {
        first
            .get(&OverflowTarget { section, item })
            .copied()
            .unwrap_or(0)
    };

    record.header.user_defined_overflow = index(OverflowSection::UserDefinedHeader, 0);
    record.header.extended_overflow = index(OverflowSection::ExtendedHeader, 0);
    for (i, image) in record.images.iter_mut().enumerate() {
        let item = i as u64 + 1;
        image.subheader.user_defined_overflow = index(OverflowSection::UserDefinedImage, item);
        image.subheader.extended_overflow = index(OverflowSection::ExtendedImage, item);
    }
    for (i, graphic) in record.graphics.iter_mut().enumerate() {
        graphic.subheader.extended_overflow =
            index(OverflowSection::ExtendedGraphic, i as u64 + 1);
    }
    for (i, text) in record.texts.iter_mut().enumerate() {
        text.subheader.extended_overflow = index(OverflowSection::ExtendedText, i as u64 + 1);
    }
}

/// Drops the overflow segments of a segment about to be removed at `index`
/// and renumbers those of the segments after it.
pub(crate) fn forget_owner(record: &mut Record, sections: &[OverflowSection], index: usize) {
    let removed = index as u64 + 1;
    let mut i = 0;
    while i < record.data_extensions.len() {
        let segment = &mut record.data_extensions[i];
        if let Some(target) = overflow_target(segment) {
            if sections.contains(&target.section) {
                if target.item == removed {
                    record.data_extensions.remove(i);
                    record.header.data_extensions.remove(i);
                    continue;
                }
                if target.item > removed {
                    segment.subheader.overflow = Some(OverflowTarget {
                        item: target.item - 1,
                        ..target
                    });
                }
            }
        }
        i += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filler(count: usize, size: usize) -> Vec<Tre> {
        (0..count)
            .map(|i| Tre::raw(&format!("T{:04}", i), vec![b'x'; size]).unwrap())
            .collect()
    }

    fn total_tres(record: &Record) -> usize {
        let in_des: usize = record
            .data_extensions
            .iter()
            .map(|s| match &s.payload {
                Payload::Tres(t) => t.len(),
                _ => 0,
            })
            .sum();
        record.header.extended.len() + in_des
    }

    #[test]
    fn test_section_length() {
        let mut section = Extensions::new();
        assert_eq!(section_length(&section, false).unwrap(), 0);
        assert_eq!(section_length(&section, true).unwrap(), 3);
        section.push(Tre::raw("A", vec![0; 10]).unwrap());
        assert_eq!(section_length(&section, false).unwrap(), 3 + 11 + 10);
    }

    #[test]
    fn test_header_overflow() {
        let mut record = Record::new();
        record.header.extended = filler(100, 1024).into_iter().collect();

        assert_eq!(record.enforce_limits().unwrap(), 1);
        // 3 + 96 * 1035 is the largest fit under 99999.
        assert_eq!(record.header.extended.len(), 96);
        assert_eq!(total_tres(&record), 100);

        let des = &record.data_extensions[0];
        assert_eq!(
            des.subheader.overflow,
            Some(OverflowTarget {
                section: OverflowSection::ExtendedHeader,
                item: 0
            })
        );
        match &des.payload {
            Payload::Tres(t) => assert_eq!(t.get(0).unwrap().tag(), "T0096"),
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn test_enforce_is_idempotent() {
        let mut record = Record::new();
        record.new_graphic_segment().subheader.extended = filler(300, 1024).into_iter().collect();
        record.enforce_limits().unwrap();
        let once = record.clone();
        record.enforce_limits().unwrap();
        assert_eq!(record, once);

        // 3 + 9 * 1035 fits the graphic limit of 9741.
        assert_eq!(record.graphics[0].subheader.extended.len(), 9);
        // 96 TREs per segment: 291 moved need 4 segments.
        assert_eq!(record.data_extensions.len(), 4);
        assert_eq!(record.header.data_extensions.len(), 4);
    }

    #[test]
    fn test_unrepresentable_tre() {
        let mut record = Record::new();
        record
            .header
            .user_defined
            .push(Tre::raw("BIG", vec![0; 99_990]).unwrap());
        assert!(matches!(
            record.enforce_limits(),
            Err(NitfError::TreNotRepresentable { .. })
        ));
    }

    #[test]
    fn test_reconcile_restores_order() {
        let tres = filler(100, 1024);
        let mut record = Record::new();
        record.header.extended = tres.iter().cloned().collect();
        record.enforce_limits().unwrap();

        record.header.extended.split_off(50);
        record.reconcile().unwrap();
        // Only the 4 overflowed TREs come back.
        assert!(record.data_extensions.is_empty());
        assert!(record.header.data_extensions.is_empty());
        let tags: Vec<&str> = record.header.extended.iter().map(|t| t.tag()).collect();
        assert_eq!(tags.len(), 54);
        assert_eq!(tags[50], "T0096");
        assert_eq!(tags[53], "T0099");
    }

    #[test]
    fn test_identical_tres_overflow_once() {
        let same = Tre::raw("SAME", vec![b'z'; 1024]).unwrap();
        let mut record = Record::new();
        record.header.extended = vec![same; 100].into_iter().collect();

        assert_eq!(record.enforce_limits().unwrap(), 1);
        assert!(section_length(&record.header.extended, true).unwrap() <= 99_999);
        assert_eq!(total_tres(&record), 100);

        let once = record.clone();
        assert_eq!(record.enforce_limits().unwrap(), 1);
        assert_eq!(record, once);
    }

    #[test]
    fn test_stalled_relocation_is_an_error() {
        assert!(check_progress(4, 3, Location::FileHeader).is_ok());
        assert!(matches!(
            check_progress(3, 3, Location::FileHeader),
            Err(NitfError::Internal { .. })
        ));
    }

    fn garbage_overflow(record: &mut Record) {
        let target = OverflowTarget {
            section: OverflowSection::ExtendedHeader,
            item: 0,
        };
        let des = record.new_data_extension_segment();
        des.subheader = DataExtensionSubheader::overflow(target, "U", &SecurityGroup::default());
        des.payload = Payload::Bytes(b"GARBAGE".to_vec());
    }

    #[test]
    fn test_bad_overflow_data_leaves_record_unchanged() {
        let mut record = Record::new();
        record.header.extended.push(Tre::raw("KEEP", b"abc".to_vec()).unwrap());
        garbage_overflow(&mut record);
        let before = record.clone();

        assert!(matches!(record.enforce_limits(), Err(NitfError::Tre { .. })));
        assert_eq!(record, before);
        assert!(matches!(record.reconcile(), Err(NitfError::Tre { .. })));
        assert_eq!(record, before);

        record.data_extensions[0].payload = Payload::Unread;
        let before = record.clone();
        assert!(matches!(record.enforce_limits(), Err(NitfError::ToWrite { .. })));
        assert_eq!(record, before);
    }

    #[test]
    fn test_reconcile_keeps_order_behind_a_full_segment() {
        let mut record = Record::new();
        record.new_graphic_segment().subheader.extended = vec![
            Tre::raw("A", vec![b'a'; 9_000]).unwrap(),
            Tre::raw("B", vec![b'b'; 95_000]).unwrap(),
            Tre::raw("E", vec![b'e'; 5_000]).unwrap(),
        ]
        .into_iter()
        .collect();
        assert_eq!(record.enforce_limits().unwrap(), 2);

        record.graphics[0].subheader.extended.remove(0);
        record.reconcile().unwrap();

        // E fits the graphic section but B does not, so both stay out.
        assert!(record.graphics[0].subheader.extended.is_empty());
        let held: Vec<Vec<&str>> = record
            .data_extensions
            .iter()
            .map(|s| match &s.payload {
                Payload::Tres(t) => t.iter().map(|t| t.tag()).collect(),
                other => panic!("unexpected payload {:?}", other),
            })
            .collect();
        assert_eq!(held, vec![vec!["B"], vec!["E"]]);
    }

    #[test]
    fn test_assign_indexes() {
        let mut record = Record::new();
        record.new_data_extension_segment();
        record.new_text_segment().subheader.extended = filler(12, 1024).into_iter().collect();
        record.enforce_limits().unwrap();
        assign_overflow_indexes(&mut record);
        assert_eq!(record.texts[0].subheader.extended_overflow, 2);
        assert_eq!(record.header.extended_overflow, 0);
    }

    #[test]
    fn test_removing_owner_retargets() {
        let mut record = Record::new();
        record.new_text_segment().subheader.extended = filler(12, 1024).into_iter().collect();
        record.new_text_segment().subheader.extended = filler(12, 1024).into_iter().collect();
        record.enforce_limits().unwrap();
        assert_eq!(record.data_extensions.len(), 2);

        record.remove_text_segment(0);
        assert_eq!(record.data_extensions.len(), 1);
        assert_eq!(
            record.data_extensions[0].subheader.overflow,
            Some(OverflowTarget {
                section: OverflowSection::ExtendedText,
                item: 1
            })
        );
    }
}

//! The pairing-relevant view of one alignment record.
//!
//! A [`Record`] carries exactly what read-pair reconciliation needs: the template
//! name, the SAM flag word, the positions of the read and its mate, and the bases and
//! qualities needed to emit FASTQ. Records are immutable once decoded; every
//! component that handles them takes them by value and hands them on exactly once.

use bstr::{BStr, ByteSlice};
use noodles::sam::alignment::record::Flags;

/// An immutable alignment record restricted to its pairing fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub(crate) name: Vec<u8>,
    pub(crate) flags: Flags,
    pub(crate) reference_name: Option<Vec<u8>>,
    pub(crate) mate_reference_name: Option<Vec<u8>>,
    pub(crate) alignment_start: i64,
    pub(crate) mate_alignment_start: i64,
    pub(crate) insert_size: i32,
    pub(crate) sequence: Vec<u8>,
    pub(crate) qualities: Vec<u8>,
}

impl Record {
    /// The template (query) name.
    #[must_use]
    pub fn name(&self) -> &[u8] {
        &self.name
    }

    /// The template name as a byte string, for display.
    #[must_use]
    pub fn name_bstr(&self) -> &BStr {
        self.name.as_bstr()
    }

    /// The raw SAM flags.
    #[must_use]
    pub fn flags(&self) -> Flags {
        self.flags
    }

    #[must_use]
    pub fn is_paired(&self) -> bool {
        self.flags.is_segmented()
    }

    #[must_use]
    pub fn is_first_of_pair(&self) -> bool {
        self.flags.is_first_segment()
    }

    #[must_use]
    pub fn is_second_of_pair(&self) -> bool {
        self.flags.is_last_segment()
    }

    #[must_use]
    pub fn is_unmapped(&self) -> bool {
        self.flags.is_unmapped()
    }

    #[must_use]
    pub fn is_mate_unmapped(&self) -> bool {
        self.flags.is_mate_unmapped()
    }

    /// True if the read aligned to the reverse strand.
    #[must_use]
    pub fn is_reverse(&self) -> bool {
        self.flags.is_reverse_complemented()
    }

    /// True for secondary and supplementary alignments, which never take part in pairing.
    #[must_use]
    pub fn is_secondary_or_supplementary(&self) -> bool {
        self.flags.is_secondary() || self.flags.is_supplementary()
    }

    #[must_use]
    pub fn reference_name(&self) -> Option<&[u8]> {
        self.reference_name.as_deref()
    }

    #[must_use]
    pub fn mate_reference_name(&self) -> Option<&[u8]> {
        self.mate_reference_name.as_deref()
    }

    /// 1-based alignment start, or 0 when the record has no position.
    #[must_use]
    pub fn alignment_start(&self) -> i64 {
        self.alignment_start
    }

    /// 1-based alignment start of the mate, or 0 when unknown.
    #[must_use]
    pub fn mate_alignment_start(&self) -> i64 {
        self.mate_alignment_start
    }

    /// Observed template length (TLEN).
    #[must_use]
    pub fn insert_size(&self) -> i32 {
        self.insert_size
    }

    #[must_use]
    pub fn sequence(&self) -> &[u8] {
        &self.sequence
    }

    /// Raw Phred quality scores; empty when the source had none.
    #[must_use]
    pub fn qualities(&self) -> &[u8] {
        &self.qualities
    }

    /// True if the read and its mate are both placed on the same reference sequence.
    #[must_use]
    pub fn mate_on_same_reference(&self) -> bool {
        self.reference_name.is_some() && self.reference_name == self.mate_reference_name
    }

    /// True if `self` and `other` are the two complementary mates of one template,
    /// `self` being first-of-pair.
    #[must_use]
    pub fn precedes_mate(&self, other: &Record) -> bool {
        self.is_first_of_pair() && other.is_second_of_pair()
    }

    /// True if `next` is the primary mate of `self`: same name, complementary
    /// first/second-of-pair flags and not secondary or supplementary.
    #[must_use]
    pub fn is_primary_mate(&self, next: &Record) -> bool {
        !next.is_secondary_or_supplementary()
            && self.name == next.name
            && (self.precedes_mate(next) || next.precedes_mate(self))
    }
}

/// Orders two mates as `(first-of-pair, second-of-pair)`.
///
/// Returns the records back unchanged as `Err` when their flags are not complementary.
pub fn order_mates(a: Record, b: Record) -> Result<(Record, Record), (Record, Record)> {
    if a.precedes_mate(&b) {
        Ok((a, b))
    } else if b.precedes_mate(&a) {
        Ok((b, a))
    } else {
        Err((a, b))
    }
}

/// Builder for [`Record`]s.
///
/// Decoders and tests construct records through this; nothing mutates a record once built.
///
/// # Examples
///
/// ```
/// use bamfq_lib::record::RecordBuilder;
///
/// let r1 = RecordBuilder::new("q1")
///     .first_of_pair()
///     .reference("chr1", 100)
///     .mate_reference("chr1", 250)
///     .insert_size(200)
///     .sequence(b"ACGT")
///     .build();
///
/// assert!(r1.is_paired());
/// assert!(r1.mate_on_same_reference());
/// assert_eq!(r1.alignment_start(), 100);
/// ```
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    record: Record,
}

impl RecordBuilder {
    /// Starts an unpaired, unplaced record with the given name.
    #[must_use]
    pub fn new(name: impl AsRef<[u8]>) -> Self {
        Self {
            record: Record {
                name: name.as_ref().to_vec(),
                flags: Flags::empty(),
                reference_name: None,
                mate_reference_name: None,
                alignment_start: 0,
                mate_alignment_start: 0,
                insert_size: 0,
                sequence: Vec::new(),
                qualities: Vec::new(),
            },
        }
    }

    /// Replaces the whole flag word.
    #[must_use]
    pub fn flags(mut self, flags: Flags) -> Self {
        self.record.flags = flags;
        self
    }

    /// Marks the record as first-of-pair (implies paired).
    #[must_use]
    pub fn first_of_pair(mut self) -> Self {
        self.record.flags.insert(Flags::SEGMENTED | Flags::FIRST_SEGMENT);
        self
    }

    /// Marks the record as second-of-pair (implies paired).
    #[must_use]
    pub fn second_of_pair(mut self) -> Self {
        self.record.flags.insert(Flags::SEGMENTED | Flags::LAST_SEGMENT);
        self
    }

    #[must_use]
    pub fn unmapped(mut self) -> Self {
        self.record.flags.insert(Flags::UNMAPPED);
        self
    }

    #[must_use]
    pub fn mate_unmapped(mut self) -> Self {
        self.record.flags.insert(Flags::MATE_UNMAPPED);
        self
    }

    #[must_use]
    pub fn reverse(mut self) -> Self {
        self.record.flags.insert(Flags::REVERSE_COMPLEMENTED);
        self
    }

    #[must_use]
    pub fn secondary(mut self) -> Self {
        self.record.flags.insert(Flags::SECONDARY);
        self
    }

    #[must_use]
    pub fn supplementary(mut self) -> Self {
        self.record.flags.insert(Flags::SUPPLEMENTARY);
        self
    }

    /// Places the record on `name` at the 1-based `start`.
    #[must_use]
    pub fn reference(mut self, name: impl AsRef<[u8]>, start: i64) -> Self {
        self.record.reference_name = Some(name.as_ref().to_vec());
        self.record.alignment_start = start;
        self
    }

    /// Places the mate on `name` at the 1-based `start`.
    #[must_use]
    pub fn mate_reference(mut self, name: impl AsRef<[u8]>, start: i64) -> Self {
        self.record.mate_reference_name = Some(name.as_ref().to_vec());
        self.record.mate_alignment_start = start;
        self
    }

    #[must_use]
    pub fn insert_size(mut self, insert_size: i32) -> Self {
        self.record.insert_size = insert_size;
        self
    }

    #[must_use]
    pub fn sequence(mut self, bases: &[u8]) -> Self {
        self.record.sequence = bases.to_vec();
        self
    }

    /// Sets raw (not ASCII-encoded) Phred qualities.
    #[must_use]
    pub fn qualities(mut self, quals: &[u8]) -> Self {
        self.record.qualities = quals.to_vec();
        self
    }

    #[must_use]
    pub fn build(self) -> Record {
        self.record
    }
}

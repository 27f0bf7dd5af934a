use tracing::trace;

use crate::domain::ViewOptions;
use crate::record::RecordSet;

pub const PAGE_SIZE: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// Active sort column and direction. `column == None` means display order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SortSpec {
    pub column: Option<String>,
    pub direction: Option<SortDirection>,
}

impl SortSpec {
    /// Header-toggle semantics: selecting the active column flips the
    /// direction, selecting another column starts ascending.
    pub fn toggle(&mut self, column: &str) {
        if self.column.as_deref() == Some(column) {
            self.direction = match self.direction {
                Some(SortDirection::Ascending) => Some(SortDirection::Descending),
                _ => Some(SortDirection::Ascending),
            };
        } else {
            self.column = Some(column.to_string());
            self.direction = Some(SortDirection::Ascending);
        }
    }

    pub fn reset(&mut self) {
        self.column = None;
        self.direction = None;
    }
}

/// The derived view of a record set: row indices after filter and sort,
/// plus the slice of them on the current page.
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    /// All matching row indices in display order (what the export writes).
    pub ordered: Vec<usize>,
    /// The indices rendered on the current page.
    pub page_rows: Vec<usize>,
    /// 1-based, clamped to `page_count`.
    pub page: usize,
    pub page_count: usize,
}

/// Recompute the view. Pure in all inputs; called on every render.
///
/// With pagination disabled (the plain variant) the base view is the first
/// ten rows of the set, still sortable, and the search term is ignored.
pub fn project(set: &RecordSet, term: &str, sort: &SortSpec, page: usize, opts: ViewOptions) -> Projection {
    let base: Vec<usize> = if opts.pagination {
        filter_rows(set, if opts.search { term } else { "" })
    } else {
        (0..set.len().min(PAGE_SIZE)).collect()
    };
    let ordered = sort_rows(set, base, sort);

    let page_count = ordered.len().div_ceil(PAGE_SIZE).max(1);
    let page = if opts.pagination { page.clamp(1, page_count) } else { 1 };
    let start = (page - 1) * PAGE_SIZE;
    let end = (start + PAGE_SIZE).min(ordered.len());
    let page_rows = ordered[start.min(ordered.len())..end].to_vec();

    trace!(
        "Projection: {} of {} rows, page {page}/{page_count}",
        ordered.len(),
        set.len()
    );
    Projection {
        ordered,
        page_rows,
        page,
        page_count,
    }
}

/// Row indices whose records contain `term` case-insensitively in at
/// least one cell. An empty term keeps everything.
pub fn filter_rows(set: &RecordSet, term: &str) -> Vec<usize> {
    if term.is_empty() {
        return (0..set.len()).collect();
    }
    let needle = term.to_lowercase();
    set.rows()
        .iter()
        .enumerate()
        .filter(|(_, row)| row.iter().any(|v| v.to_lowercase().contains(&needle)))
        .map(|(idx, _)| idx)
        .collect()
}

/// Stable sort of `indices` by the sort column's string value (missing
/// cells compare as empty). Stability keeps repeated header toggles
/// predictable for equal keys.
pub fn sort_rows(set: &RecordSet, mut indices: Vec<usize>, sort: &SortSpec) -> Vec<usize> {
    let Some(column) = sort.column.as_deref() else {
        return indices;
    };
    match sort.direction {
        Some(SortDirection::Descending) => {
            indices.sort_by(|&a, &b| set.value_at(b, column).cmp(set.value_at(a, column)));
        }
        _ => {
            indices.sort_by(|&a, &b| set.value_at(a, column).cmp(set.value_at(b, column)));
        }
    }
    indices
}

/// Materialize the full filtered+sorted view (all pages) as its own
/// record set, the shape the CSV export serializes.
pub fn viewed_records(set: &RecordSet, projection: &Projection) -> RecordSet {
    let rows = projection
        .ordered
        .iter()
        .map(|&ridx| {
            set.headers()
                .iter()
                .map(|h| set.value_at(ridx, h).to_string())
                .collect()
        })
        .collect();
    RecordSet::new(set.headers().to_vec(), rows)
}

// Physiological reference ranges, matched by case-insensitive substring
// against the column name. Any matching rule flags the value.
const NORMAL_RANGES: &[(&str, Option<f64>, Option<f64>)] = &[
    ("blood_pressure", None, Some(140.0)),
    ("heart_rate", Some(60.0), Some(100.0)),
    ("temperature", Some(97.0), Some(99.5)),
    ("glucose", None, Some(140.0)),
    ("cholesterol", None, Some(200.0)),
    ("weight", Some(50.0), Some(300.0)),
];

/// Whether a cell value falls outside the reference range for its column.
/// Unparsable values and unmatched column names are never abnormal.
pub fn is_abnormal(header: &str, value: &str) -> bool {
    let Some(numeric) = parse_leading_float(value) else {
        return false;
    };
    let lower_header = header.to_lowercase();
    NORMAL_RANGES
        .iter()
        .filter(|(key, _, _)| lower_header.contains(key))
        .any(|&(_, min, max)| {
            min.is_some_and(|m| numeric < m) || max.is_some_and(|m| numeric > m)
        })
}

/// Longest numeric prefix of the trimmed value, so compound readings like
/// "135/80" flag on the systolic component.
fn parse_leading_float(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    let mut boundaries: Vec<usize> = trimmed.char_indices().map(|(i, _)| i).collect();
    boundaries.push(trimmed.len());
    boundaries
        .into_iter()
        .rev()
        .find_map(|end| trimmed[..end].parse::<f64>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patients() -> RecordSet {
        let headers = vec!["id".to_string(), "name".to_string(), "heart_rate".to_string()];
        let rows = vec![
            vec!["1".into(), "Ada".into(), "72".into()],
            vec!["2".into(), "Bob".into(), "110".into()],
            vec!["3".into(), "ada lovelace".into(), "72".into()],
            vec!["4".into(), "Cleo".into(), "58".into()],
        ];
        RecordSet::new(headers, rows)
    }

    fn numbered(n: usize) -> RecordSet {
        let rows = (0..n)
            .map(|i| vec![format!("r{i:02}"), (i % 3).to_string()])
            .collect();
        RecordSet::new(vec!["id".into(), "group".into()], rows)
    }

    #[test]
    fn filter_matches_any_cell_case_insensitively() {
        let set = patients();
        let hits = filter_rows(&set, "ADA");
        assert_eq!(hits, vec![0, 2]);
        for &idx in &hits {
            assert!(
                set.rows()[idx]
                    .iter()
                    .any(|v| v.to_lowercase().contains("ada"))
            );
        }
        for idx in [1usize, 3] {
            assert!(
                !set.rows()[idx]
                    .iter()
                    .any(|v| v.to_lowercase().contains("ada"))
            );
        }
    }

    #[test]
    fn empty_term_is_identity() {
        let set = patients();
        assert_eq!(filter_rows(&set, ""), vec![0, 1, 2, 3]);
    }

    #[test]
    fn sort_is_stable_and_idempotent() {
        let set = patients();
        let spec = SortSpec {
            column: Some("heart_rate".into()),
            direction: Some(SortDirection::Ascending),
        };
        let once = sort_rows(&set, (0..set.len()).collect(), &spec);
        let twice = sort_rows(&set, once.clone(), &spec);
        // "110" < "58" < "72" as strings; rows 0 and 2 tie and keep order
        assert_eq!(once, vec![1, 3, 0, 2]);
        assert_eq!(once, twice);
    }

    #[test]
    fn toggling_direction_reverses_distinct_keys() {
        let set = patients();
        let mut spec = SortSpec::default();
        spec.toggle("name");
        let asc = sort_rows(&set, (0..set.len()).collect(), &spec);
        spec.toggle("name");
        assert_eq!(spec.direction, Some(SortDirection::Descending));
        let desc = sort_rows(&set, (0..set.len()).collect(), &spec);
        // all name keys are distinct, so descending is the exact reverse
        let mut reversed = asc.clone();
        reversed.reverse();
        assert_eq!(desc, reversed);
    }

    #[test]
    fn toggling_a_new_column_starts_ascending() {
        let mut spec = SortSpec::default();
        spec.toggle("name");
        spec.toggle("name");
        spec.toggle("id");
        assert_eq!(spec.column.as_deref(), Some("id"));
        assert_eq!(spec.direction, Some(SortDirection::Ascending));
    }

    #[test]
    fn pages_partition_the_view() {
        let set = numbered(23);
        let sort = SortSpec::default();
        let opts = ViewOptions::default();
        let mut collected = Vec::new();
        let first = project(&set, "", &sort, 1, opts);
        assert_eq!(first.page_count, 3);
        for page in 1..=first.page_count {
            let p = project(&set, "", &sort, page, opts);
            if page < p.page_count {
                assert_eq!(p.page_rows.len(), PAGE_SIZE);
            } else {
                assert!(p.page_rows.len() <= PAGE_SIZE);
            }
            collected.extend(p.page_rows);
        }
        assert_eq!(collected, first.ordered);
    }

    #[test]
    fn page_clamps_to_the_filtered_view() {
        let set = numbered(23);
        let sort = SortSpec::default();
        let p = project(&set, "", &sort, 99, ViewOptions::default());
        assert_eq!(p.page, 3);
        assert_eq!(p.page_rows.len(), 3);
    }

    #[test]
    fn plain_variant_sorts_only_the_first_ten_rows() {
        let set = numbered(23);
        let mut sort = SortSpec::default();
        sort.toggle("group");
        let p = project(&set, "r2", &sort, 5, ViewOptions::plain());
        // search term and page are ignored, base view is rows 0..10
        assert_eq!(p.page, 1);
        assert_eq!(p.page_count, 1);
        assert_eq!(p.ordered.len(), 10);
        assert!(p.ordered.iter().all(|&i| i < 10));
        assert_eq!(p.page_rows, p.ordered);
        let groups: Vec<&str> = p.ordered.iter().map(|&i| set.rows()[i][1].as_str()).collect();
        let mut expected = groups.clone();
        expected.sort();
        assert_eq!(groups, expected);
    }

    #[test]
    fn abnormal_reference_ranges() {
        assert!(is_abnormal("Heart_Rate", "110"));
        assert!(!is_abnormal("Heart_Rate", "72"));
        assert!(is_abnormal("Heart_Rate", "59"));
        assert!(!is_abnormal("Notes", "110"));
        assert!(!is_abnormal("Temperature", "abc"));
        assert!(is_abnormal("Temperature", "96.5"));
        assert!(is_abnormal("blood_pressure_reading", "150/95"));
        assert!(!is_abnormal("Blood_Pressure", "120/80"));
        assert!(is_abnormal("Glucose", "141"));
        assert!(!is_abnormal("Glucose", "140"));
        assert!(is_abnormal("Weight", "42"));
    }

    #[test]
    fn export_view_follows_filter_and_sort() {
        let set = patients();
        let mut sort = SortSpec::default();
        sort.toggle("name");
        let p = project(&set, "ada", &sort, 1, ViewOptions::default());
        let exported = viewed_records(&set, &p);
        assert_eq!(exported.len(), 2);
        assert_eq!(exported.value_at(0, "name"), "Ada");
        assert_eq!(exported.value_at(1, "name"), "ada lovelace");
        assert_eq!(exported.headers(), set.headers());
    }
}

// Batching policy for render groups.
//
// OCR on a single isolated glyph with no neighbor context is noticeably less
// reliable, so the planner never leaves a trailing group of 1: a lone final
// character is folded into the previous group instead (groups can therefore
// reach size 4). A distinct list of exactly one character still yields a lone
// group of 1 - there is nothing to merge it into, and dispatching it keeps
// the character recognizable without manual intervention.

use crate::core::types::RenderGroup;
use tracing::debug;

/// Partition the ordered distinct placeholder list into render groups:
/// 3 at a time while at least 3 remain, 2 when exactly 2 remain, and a lone
/// trailing 1 merged into the previous group. Concatenating the returned
/// groups in order reproduces `chars` exactly.
pub fn plan_groups(chars: &[char]) -> Vec<RenderGroup> {
    let mut planned: Vec<Vec<char>> = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let remaining = chars.len() - i;

        if remaining == 1 && !planned.is_empty() {
            // Fold the last single char into the previous group
            if let Some(last) = planned.last_mut() {
                last.push(chars[i]);
            }
            break;
        }

        // remaining is 2 here, or 1 when there was no previous group to fold into
        let group_size = if remaining >= 3 { 3 } else { remaining };
        planned.push(chars[i..i + group_size].to_vec());
        i += group_size;
    }

    debug!(chars = chars.len(), groups = planned.len(), "groups planned");

    planned
        .into_iter()
        .enumerate()
        .map(|(index, group)| RenderGroup::new(index, group))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chars(n: usize) -> Vec<char> {
        (0..n)
            .map(|i| char::from_u32(0xE000 + i as u32).unwrap())
            .collect()
    }

    fn sizes(groups: &[RenderGroup]) -> Vec<usize> {
        groups.iter().map(|g| g.len()).collect()
    }

    #[test]
    fn test_empty_list_yields_no_groups() {
        assert!(plan_groups(&[]).is_empty());
    }

    #[test]
    fn test_single_char_yields_lone_group_of_one() {
        let input = chars(1);
        let groups = plan_groups(&input);
        assert_eq!(sizes(&groups), vec![1]);
        assert_eq!(groups[0].chars, input);
    }

    #[test]
    fn test_small_lists() {
        assert_eq!(sizes(&plan_groups(&chars(2))), vec![2]);
        assert_eq!(sizes(&plan_groups(&chars(3))), vec![3]);
        // 4 = 3 + trailing 1, folded into the first group
        assert_eq!(sizes(&plan_groups(&chars(4))), vec![4]);
        assert_eq!(sizes(&plan_groups(&chars(5))), vec![3, 2]);
        assert_eq!(sizes(&plan_groups(&chars(6))), vec![3, 3]);
        assert_eq!(sizes(&plan_groups(&chars(7))), vec![3, 4]);
        assert_eq!(sizes(&plan_groups(&chars(8))), vec![3, 3, 2]);
    }

    #[test]
    fn test_no_trailing_singleton_for_lists_of_two_or_more() {
        for n in 2..=40 {
            let groups = plan_groups(&chars(n));
            for group in &groups {
                assert!(
                    (2..=4).contains(&group.len()),
                    "n={} produced a group of size {}",
                    n,
                    group.len()
                );
            }
        }
    }

    #[test]
    fn test_concatenation_reproduces_input_order() {
        for n in 0..=40 {
            let input = chars(n);
            let rebuilt: Vec<char> = plan_groups(&input)
                .iter()
                .flat_map(|g| g.chars.iter().copied())
                .collect();
            assert_eq!(rebuilt, input, "n={}", n);
        }
    }

    #[test]
    fn test_group_indices_are_sequential() {
        let groups = plan_groups(&chars(8));
        let indices: Vec<usize> = groups.iter().map(|g| g.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }
}

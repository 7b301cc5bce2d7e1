//! Property-based tests for window aggregation.
//!
//! These check that checkpointed evaluation, spilled partitions and plain incremental
//! evaluation all agree with a brute-force recomputation of every frame, for both `ROWS`
//! and `RANGE` frames.

use proptest::prelude::*;
use winagg_core::{DataType, Row, Value};
use winagg_query::{
    ArgExpr, ColumnKeys, FrameBound, FrameSpec, VecSource, WindowAggExecutor, WindowCall,
    WindowConfig,
};
use winagg_storage::StoreConfig;

/// Input rows of `(partition, order key, value)`, sorted by partition then key so that
/// peers repeat.
fn rows_strategy(max_rows: usize) -> impl Strategy<Value = Vec<(i64, i64, Option<i64>)>> {
    prop::collection::vec(
        (0i64..3, 0i64..5, prop::option::weighted(0.85, -1000i64..1000)),
        0..max_rows,
    )
    .prop_map(|mut rows| {
        rows.sort_by_key(|&(p, k, _)| (p, k));
        rows
    })
}

#[derive(Clone, Copy, Debug)]
enum Frame {
    /// Signed offsets from the current row; `None` is an unbounded edge.
    Rows(Option<i64>, Option<i64>),
    /// Whether each edge is unbounded; a bounded edge is `CURRENT ROW`.
    Range(bool, bool),
}

fn frame_strategy() -> impl Strategy<Value = Frame> {
    let edge = || prop::option::weighted(0.8, -6i64..6);
    let rows = (edge(), edge())
        .prop_filter("frame must not end before it starts", |(s, e)| match (s, e) {
            (Some(s), Some(e)) => s.signum() <= e.signum(),
            _ => true,
        })
        .prop_map(|(s, e)| Frame::Rows(s, e));
    let range = (any::<bool>(), any::<bool>()).prop_map(|(s, e)| Frame::Range(s, e));
    prop_oneof![3 => rows, 2 => range]
}

fn bound(offset: i64) -> FrameBound {
    match offset {
        0 => FrameBound::CurrentRow,
        n if n < 0 => FrameBound::preceding(-n),
        n => FrameBound::following(n),
    }
}

fn frame_spec(frame: Frame) -> FrameSpec {
    match frame {
        Frame::Rows(start, end) => FrameSpec::rows(
            start.map_or(FrameBound::UnboundedPreceding, bound),
            end.map_or(FrameBound::UnboundedFollowing, bound),
        ),
        Frame::Range(start, end) => FrameSpec::range(
            if start {
                FrameBound::UnboundedPreceding
            } else {
                FrameBound::CurrentRow
            },
            if end {
                FrameBound::UnboundedFollowing
            } else {
                FrameBound::CurrentRow
            },
        ),
    }
}

fn to_rows(input: &[(i64, i64, Option<i64>)]) -> Vec<Row> {
    input
        .iter()
        .enumerate()
        .map(|(i, &(p, k, v))| {
            Row::new(
                i as u64,
                vec![
                    Value::Int64(p),
                    Value::Int64(k),
                    v.map_or(Value::Null, Value::Int64),
                ],
            )
        })
        .collect()
}

/// Column of the first output; earlier columns are the input.
const FIRST_OUTPUT: usize = 3;

fn run(input: &[(i64, i64, Option<i64>)], frame: Frame, config: WindowConfig) -> Vec<Row> {
    let value = || ArgExpr::column(2);
    WindowAggExecutor::builder(VecSource::new(to_rows(input)))
        .partition_by(ColumnKeys::new([0]))
        .order_by(ColumnKeys::new([1]))
        .frame(frame_spec(frame))
        .call(WindowCall::new("sum").arg(value(), DataType::Int64))
        .call(WindowCall::new("count").arg(value(), DataType::Int64))
        .call(WindowCall::new("count"))
        .call(WindowCall::new("min").arg(value(), DataType::Int64))
        .call(WindowCall::new("max").arg(value(), DataType::Int64))
        .call(WindowCall::new("avg").arg(value(), DataType::Int64))
        .call(WindowCall::new("lag").arg(value(), DataType::Int64))
        .call(WindowCall::new("lead").arg(value(), DataType::Int64))
        .call(WindowCall::new("first_value").arg(value(), DataType::Int64))
        .call(WindowCall::new("last_value").arg(value(), DataType::Int64))
        .call(
            WindowCall::new("nth_value")
                .arg(value(), DataType::Int64)
                .arg(ArgExpr::literal(Value::Int64(2)), DataType::Int64),
        )
        .call(WindowCall::new("rank"))
        .call(WindowCall::new("cume_dist"))
        .config(config)
        .build()
        .unwrap()
        .execute()
        .unwrap()
}

/// Recomputes `[sum, count(x), count(*), min, max]` of every row's frame from scratch,
/// followed by `[first_value, last_value, nth_value(2)]`.
fn naive(input: &[(i64, i64, Option<i64>)], frame: Frame) -> Vec<Vec<Value>> {
    let or_null = |v: Option<i64>| v.map_or(Value::Null, Value::Int64);
    let mut out = Vec::with_capacity(input.len());
    let mut begin = 0;
    while begin < input.len() {
        let key = input[begin].0;
        let end = begin + input[begin..].iter().take_while(|r| r.0 == key).count();
        let part = &input[begin..end];
        let len = part.len() as i64;
        for i in 0..len {
            let order = part[i as usize].1;
            let peers_from = part.iter().position(|r| r.1 == order).unwrap_or(0) as i64;
            let peers_to = part.iter().rposition(|r| r.1 == order).map_or(len, |p| p as i64 + 1);
            let (head, tail) = match frame {
                Frame::Rows(s, e) => (
                    s.map_or(0, |o| (i + o).clamp(0, len)),
                    e.map_or(len, |o| (i + o + 1).clamp(0, len)),
                ),
                Frame::Range(s, e) => (
                    if s { 0 } else { peers_from },
                    if e { len } else { peers_to },
                ),
            };
            let rows: Vec<Option<i64>> = if head < tail {
                part[head as usize..tail as usize].iter().map(|r| r.2).collect()
            } else {
                Vec::new()
            };
            let present: Vec<i64> = rows.iter().flatten().copied().collect();
            out.push(vec![
                or_null(if present.is_empty() { None } else { Some(present.iter().sum()) }),
                Value::Int64(present.len() as i64),
                Value::Int64(rows.len() as i64),
                or_null(present.iter().min().copied()),
                or_null(present.iter().max().copied()),
                or_null(rows.first().copied().flatten()),
                or_null(rows.last().copied().flatten()),
                or_null(rows.get(1).copied().flatten()),
            ]);
        }
        begin = end;
    }
    out
}

proptest! {
    /// Property: every aggregate and frame-aware value function matches a brute-force
    /// recomputation of its frame.
    #[test]
    fn aggregates_match_naive_recomputation(
        input in rows_strategy(60),
        frame in frame_strategy(),
    ) {
        let out = run(&input, frame, WindowConfig::default());
        let expected = naive(&input, frame);
        prop_assert_eq!(out.len(), expected.len());
        for (row, want) in out.iter().zip(&expected) {
            let values = row.values();
            prop_assert_eq!(&values[FIRST_OUTPUT..FIRST_OUTPUT + 5], &want[..5]);
            prop_assert_eq!(&values[FIRST_OUTPUT + 8..FIRST_OUTPUT + 11], &want[5..]);
        }
    }

    /// Property: checkpoints never change a result, in memory or after spilling.
    #[test]
    fn checkpoints_do_not_change_results(
        input in rows_strategy(120),
        frame in frame_strategy(),
        count in 1usize..5,
        first_step in 1i64..8,
        min_frame_size in 0i64..4,
        work_mem in prop::sample::select(vec![128usize, 1024, usize::MAX]),
    ) {
        let store = StoreConfig::new().with_work_mem(work_mem);
        let plain = run(
            &input,
            frame,
            WindowConfig::new().with_store(store.clone()).with_checkpoints_enabled(false),
        );
        let checkpointed = run(
            &input,
            frame,
            WindowConfig::new()
                .with_store(store)
                .with_checkpoint_count(count)
                .with_first_step(first_step)
                .with_min_frame_size(min_frame_size),
        );
        prop_assert_eq!(plain, checkpointed);
    }

    /// Property: spilling a partition never changes a result.
    #[test]
    fn spilling_does_not_change_results(
        input in rows_strategy(120),
        frame in frame_strategy(),
    ) {
        let in_memory = run(&input, frame, WindowConfig::default());
        let spilled = run(&input, frame, WindowConfig::new().with_work_mem(96));
        prop_assert_eq!(in_memory, spilled);
    }

    /// Property: sums whose partial results leave the Int64 range agree with and without
    /// checkpoints, and match a wide recomputation whenever the frame total fits.
    #[test]
    fn extreme_sums_do_not_depend_on_checkpoints(
        values in prop::collection::vec(
            prop::sample::select(vec![i64::MAX, i64::MIN, -1, 0, 1]),
            1..40,
        ),
        preceding in 0i64..6,
        following in 0i64..6,
    ) {
        let input: Vec<(i64, i64, Option<i64>)> =
            values.iter().enumerate().map(|(i, &v)| (0, i as i64, Some(v))).collect();
        let frame = Frame::Rows(Some(-preceding), Some(following));
        let sums = |config: WindowConfig| -> Vec<Result<Value, String>> {
            let mut exec = WindowAggExecutor::builder(VecSource::new(to_rows(&input)))
                .frame(frame_spec(frame))
                .call(WindowCall::new("sum").arg(ArgExpr::column(2), DataType::Int64))
                .config(config)
                .build()
                .unwrap();
            let mut out = Vec::new();
            loop {
                match exec.next_row() {
                    Ok(Some(row)) => out.push(Ok(row.values()[FIRST_OUTPUT].clone())),
                    Ok(None) => break,
                    Err(err) => {
                        out.push(Err(err.to_string()));
                        break;
                    }
                }
            }
            out
        };

        let plain = sums(WindowConfig::new().with_checkpoints_enabled(false));
        let checkpointed = sums(WindowConfig::new().with_first_step(1).with_min_frame_size(0));
        prop_assert_eq!(&plain, &checkpointed);

        let len = values.len() as i64;
        for (i, got) in plain.iter().enumerate() {
            let i = i as i64;
            let lo = (i - preceding).max(0) as usize;
            let hi = (i + following + 1).min(len) as usize;
            let wide: i128 = values[lo..hi].iter().map(|&v| v as i128).sum();
            match i64::try_from(wide) {
                Ok(sum) => prop_assert_eq!(got, &Ok::<Value, String>(Value::Int64(sum))),
                Err(_) => prop_assert!(got.is_err()),
            }
        }
    }
}

/*!

This is the long-form manual for `electoral_forecast` and `evsim`.

## Aggregation

Each region is resolved on its own, by walking down an escalation chain until one stage
produces a leader:

1. Averaging over a window of 1 week. All the polls in the window are averaged, with
   candidate B counting positively and candidate A negatively. Polls showing a dead heat
   count in the denominator. If the average is exactly zero, the most recent decisive poll
   of the same window decides.
2. The same, doubling the window each time: 2, 4, 8 and 16 weeks.
3. The most recent decisive poll of the primary pairing over the last 52 weeks.
4. The most recent decisive poll of the secondary pairing (the older matchup, in which
   another name stands for candidate B) over the last 52 weeks.
5. The historical baseline of the region, which always succeeds.

The record is tagged with the tier that produced it: `primary` for stages 1 to 3,
`secondary-candidate-fallback` for stage 4 and `historical-fallback` for stage 5.

A failing retrieval is attempted again, up to 3 times per stage. After that, the stage
counts as having no data and the chain moves on.

All the window sizes and the number of attempts are configurable. When the cap is not a
power of two times the first window, the last averaging window is the cap itself: with a
cap of 10 weeks the windows are 1, 2, 4, 8 and 10 weeks.

Polls with a negative or non-finite margin are ignored.

## Tally

The electors of each region go to the leader of that region. The totals are also split
by provenance tier. When both candidates have the same total, the outcome is a tie.

## Interpolation

Two separate rules exist.

**Midpoint reconstruction** fills a missing date halfway between two real snapshots.
When the two records of a region agree on the leader, the margins are averaged. When they
disagree, the larger margin keeps the lead with half of the difference between the
margins. The tally is then recomputed from the reconstructed snapshot.

**Animation frames** blend two snapshots for a given `alpha` between 0 and 1. When the
leader is the same, the margin is blended linearly. When the leader differs, the first
margin shrinks to zero at `alpha = 0.5`, and the second margin grows from there. The
totals of the frame are blended directly from the two tallies: they are not recomputed
from the blended map, and may disagree with it.

## Changes

Between two consecutive snapshots, the following is reported:

- a region whose leader changed
- a region whose leader stayed the same, but whose margin moved by more than 75%
  of the old margin (the threshold is configurable). A region with an old margin of
  zero is never reported this way.
- a region that moved from the historical baseline to the secondary pairing or back,
  or from either fallback to the primary pairing
- changes in the number of electors resolved by each fallback tier
- changes in the candidate totals, or the absence of any
- a change of the overall leader, a tie being a valid state

## Files

`evsim` writes the following files, all in JSON:

- `polling_results_<date>.json` the snapshot: the date, whether it was interpolated, and
  for each region the label of the leader, the margin and the provenance tier
- `electoral_votes_<date>.json` the tally, by candidate label and by provenance tier
- `polling_results_<pct>_<date>.json` and `electoral_votes_<pct>_<date>.json` the frames
  of an animation, where `<pct>` is `alpha` in percent, rounded

## Command line

```bash
evsim simulate --config config.json --polls polls.csv --date 2024-09-01
evsim interpolate --config config.json --before 2024-08-30 --after 2024-09-03
evsim animate --config config.json --from 2024-08-30 --to 2024-09-03 --frames 10
evsim changes --config config.json
```

*/

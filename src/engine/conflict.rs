use chrono::NaiveDate;
use futures::future::try_join_all;
use ulid::Ulid;

use crate::model::*;
use crate::store::StoreError;

use super::{Engine, EngineError};

/// First block, in start order, whose window overlaps `buffered`.
pub fn first_conflict<'a>(buffered: &TimeWindow, blocks: &'a [CalendarBlock]) -> Option<&'a CalendarBlock> {
    blocks.iter().find(|b| buffered.overlaps(&b.window))
}

impl Engine {
    /// Buffers for a space, falling back to the configured defaults.
    pub async fn buffers_for(&self, space_id: Ulid) -> Result<SpaceBuffers, EngineError> {
        Ok(self
            .store
            .space_buffers(space_id)
            .await?
            .unwrap_or(SpaceBuffers {
                space_id,
                setup_hours: self.config.default_setup_hours,
                teardown_hours: self.config.default_teardown_hours,
            }))
    }

    /// Blocks of `date` and both neighbouring dates, moved onto `date`'s
    /// minute line and sorted by start. A block that spills past midnight
    /// then conflicts with the early hours of the following date.
    pub(super) async fn blocks_around(&self, space_id: Ulid, date: NaiveDate) -> Result<Vec<CalendarBlock>, EngineError> {
        let days = [(-1, date.pred_opt()), (0, Some(date)), (1, date.succ_opt())];
        let reads = days.into_iter().filter_map(|(offset, day)| {
            let day = day?;
            Some(async move {
                let blocks = self.store.blocks_on(space_id, day).await?;
                Ok::<_, StoreError>((offset, blocks))
            })
        });
        let mut placed = Vec::new();
        for (offset, blocks) in try_join_all(reads).await? {
            placed.extend(blocks.into_iter().map(|mut block| {
                block.window = block.window.shift_days(offset);
                block
            }));
        }
        placed.sort_by_key(|b| b.window.start);
        Ok(placed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(start: Minute, end: Minute) -> CalendarBlock {
        CalendarBlock {
            id: Ulid::new(),
            space_id: Ulid::new(),
            date: NaiveDate::from_ymd_opt(2026, 5, 9).unwrap(),
            window: TimeWindow::new(start, end),
            quote_id: None,
            block_type: BlockType::Manual,
            reason: "maintenance".into(),
        }
    }

    #[test]
    fn finds_earliest_overlap() {
        let blocks = vec![block(60, 120), block(600, 700), block(800, 900)];
        let hit = first_conflict(&TimeWindow::new(650, 850), &blocks).unwrap();
        assert_eq!(hit.window.start, 600);
    }

    #[test]
    fn adjacent_block_is_free() {
        let blocks = vec![block(600, 720)];
        assert!(first_conflict(&TimeWindow::new(720, 960), &blocks).is_none());
        assert!(first_conflict(&TimeWindow::new(360, 600), &blocks).is_none());
    }

    #[test]
    fn previous_day_spill_conflicts() {
        // 22:00-03:00 yesterday, placed on today's line
        let spill = block(1320, 1620);
        let placed = CalendarBlock {
            window: spill.window.shift_days(-1),
            ..spill
        };
        let blocks = vec![placed];
        assert!(first_conflict(&TimeWindow::new(120, 600), &blocks).is_some());
        assert!(first_conflict(&TimeWindow::new(180, 600), &blocks).is_none());
    }
}

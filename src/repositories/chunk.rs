/// PostgreSQL 绑定参数上限为 32767，留余量取 32000
pub const BIND_PARAM_BUDGET: usize = 32_000;

/// 默认单块行数
pub const DEFAULT_CHUNK_ROWS: usize = 3_000;

/// 计算单块行数：行数 × 列数 不超过参数预算，且不超过默认块大小
pub fn rows_per_chunk(columns: usize) -> usize {
    let cap = BIND_PARAM_BUDGET / columns.max(1);
    DEFAULT_CHUNK_ROWS.min(cap).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn narrow_table_uses_default() {
        assert_eq!(rows_per_chunk(8), 3_000);
    }

    #[test]
    fn wide_table_shrinks_chunk() {
        // tech_indicators 19 列
        assert_eq!(rows_per_chunk(19), 32_000 / 19);
        assert!(rows_per_chunk(19) * 19 <= BIND_PARAM_BUDGET);
    }

    proptest! {
        // 任意列数下单个事务绑定参数都不超过 PostgreSQL 上限
        #[test]
        fn chunk_never_exceeds_bind_ceiling(columns in 1usize..256) {
            let rows = rows_per_chunk(columns);
            prop_assert!(rows >= 1);
            prop_assert!(rows * columns <= 32_767);
        }
    }
}

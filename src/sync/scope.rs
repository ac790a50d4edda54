/// 按分片大小切分标的列表；分片是并发与 dedup_key 的粒度
pub fn shard_codes(codes: &[String], shard_size: usize) -> Vec<Vec<String>> {
    let size = shard_size.max(1);
    codes.chunks(size).map(|c| c.to_vec()).collect()
}

/// 分片指纹，进补录 dedup_key；同一批代码恒定
pub fn shard_fingerprint(codes: &[String]) -> String {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut sorted: Vec<&String> = codes.iter().collect();
    sorted.sort();
    let mut hasher = DefaultHasher::new();
    for code in sorted {
        code.hash(&mut hasher);
    }
    format!("{:016x}", hasher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codes(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("{:06}", i)).collect()
    }

    #[test]
    fn sharding_covers_all_codes() {
        let all = codes(230);
        let shards = shard_codes(&all, 100);
        assert_eq!(shards.len(), 3);
        assert_eq!(shards[0].len(), 100);
        assert_eq!(shards[2].len(), 30);
        let total: usize = shards.iter().map(|s| s.len()).sum();
        assert_eq!(total, 230);
    }

    #[test]
    fn fingerprint_ignores_order() {
        let a = vec!["000001".to_string(), "600519".to_string()];
        let b = vec!["600519".to_string(), "000001".to_string()];
        assert_eq!(shard_fingerprint(&a), shard_fingerprint(&b));
        let c = vec!["000002".to_string()];
        assert_ne!(shard_fingerprint(&a), shard_fingerprint(&c));
    }
}

//! TokenGenerator port - ロックの fencing token 生成
//!
//! token は取得試行ごとに一意で、推測できない値でなければなりません。
//! 他プロセスの token を知らない限りロックを解放できないことを保証します。

use ulid::Ulid;

use crate::ports::Clock;

/// TokenGenerator は fencing token を生成
///
/// # Thread Safety
/// - `Send + Sync` を要求（複数ワーカーから使える）
pub trait TokenGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// ULID ベースの token 生成器
///
/// 先頭 48 bit が Clock のミリ秒、残り 80 bit が乱数です。
pub struct UlidTokenGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidTokenGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }
}

impl<C: Clock> TokenGenerator for UlidTokenGenerator<C> {
    fn generate(&self) -> String {
        let timestamp_ms = self.clock.now().timestamp_millis() as u64;
        Ulid::from_parts(timestamp_ms, rand::random()).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{FixedClock, SystemClock};
    use chrono::{TimeZone, Utc};

    #[test]
    fn tokens_are_unique() {
        let tokens = UlidTokenGenerator::new(SystemClock);

        let t1 = tokens.generate();
        let t2 = tokens.generate();
        let t3 = tokens.generate();

        assert_ne!(t1, t2);
        assert_ne!(t2, t3);
        assert_ne!(t1, t3);
    }

    #[test]
    fn tokens_differ_even_with_a_frozen_clock() {
        let fixed_time = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let tokens = UlidTokenGenerator::new(FixedClock::new(fixed_time));

        let t1: Ulid = tokens.generate().parse().unwrap();
        let t2: Ulid = tokens.generate().parse().unwrap();

        // ランダム部分があるので token は異なる
        assert_ne!(t1, t2);
        // ただし timestamp 部分は同じ
        assert_eq!(t1.timestamp_ms(), t2.timestamp_ms());
        assert_eq!(t1.timestamp_ms(), fixed_time.timestamp_millis() as u64);
    }
}

//! Alert text shown to subscribers.

use common::{Direction, Signal, WatchKey};
use tracker::PositionEvent;

pub fn entry_alert(key: &WatchKey, signal: &Signal) -> String {
    let head = match signal.direction {
        Direction::Long => "📈 Entry found",
        Direction::Short => "📉 Entry found",
    };
    format!(
        "{head}\n✅ {} {}\nPrice: {:.6}\nStop:  {:.6}\nTP1:   {:.6} | TP2: {:.6}",
        signal.direction,
        key.label(),
        signal.entry_price,
        signal.stop_price,
        signal.tp1_price,
        signal.tp2_price,
    )
}

pub fn event_alert(event: &PositionEvent) -> String {
    match event {
        PositionEvent::Tp1Reached { key, price } => {
            format!("✅ TP1 reached — {} @ {:.6}", key.label(), price)
        }
        PositionEvent::Tp2Reached { key, price } => {
            format!("🎯 TP2 reached — {} @ {:.6}", key.label(), price)
        }
        PositionEvent::Stopped { key, stop_price } => {
            format!("🛑 STOP — {} @ {:.6}", key.label(), stop_price)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use common::Timeframe;

    #[test]
    fn entry_alert_names_direction_pair_and_levels() {
        let key = WatchKey::parse("BTC_USDT", Timeframe::M15).unwrap();
        let signal = Signal {
            direction: Direction::Long,
            entry_price: 95.5,
            stop_price: 94.5,
            tp1_price: 96.0,
            tp2_price: 96.5,
            bar_time: Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
        };
        let text = entry_alert(&key, &signal);
        assert!(text.contains("LONG BTC/USDT 15m"));
        assert!(text.contains("95.500000"));
        assert!(text.contains("94.500000"));
        assert!(text.contains("96.000000"));
        assert!(text.contains("96.500000"));
    }

    #[test]
    fn stop_alert_reports_the_stop_level() {
        let key = WatchKey::parse("ETH_USDT", Timeframe::H1).unwrap();
        let text = event_alert(&PositionEvent::Stopped {
            key,
            stop_price: 1800.25,
        });
        assert!(text.contains("STOP"));
        assert!(text.contains("ETH/USDT 1h"));
        assert!(text.contains("1800.250000"));
    }
}

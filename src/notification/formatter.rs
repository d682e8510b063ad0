//! Turns an enriched trade event into the HTML alert and picks the delivery
//! form (photo with caption or plain message).

use serde_json::{Value, json};

use super::{
    error::FormatError,
    sanitize::{escape_html, sanitize_html},
    template::TemplateService,
};
use crate::{
    config::NotificationConfig,
    models::{DegradedField, EnrichedContext, TradeEvent, Watch},
};

/// The built-in buy alert layout.
pub const DEFAULT_TEMPLATE: &str = r#"{{ asset.name }} <b>BUY ALERT!</b>
{{ emoji | emoji_bar(trade.usd, step) }}
💶 <b>Bought:</b> ${{ trade.usd | usd }} ({{ trade.base }} ETH)
🪙 <b>Got:</b> {% if holder %}{{ holder.balance }} {{ asset.symbol }}{% if holder.is_empty %} &lt;--- MEV Bot{% endif %}{% else %}N/A{% endif %}
🔲 <b>Buyer:</b> <a href="{{ links.buyer }}">{{ trade.maker | short_address }}</a> | <a href="{{ links.tx }}">Txn</a>
🔄 <b>Holder Count:</b> {{ holders }}
{% if holder and holder.is_new %}✅ <b>New Holder!</b>
{% endif %}📈 <b>Price:</b> {% if market %}${{ market.price | price(price_precision) }}{% else %}N/A{% endif %}
📊 <b>MarketCap:</b> {% if market %}{{ market.market_cap | market_cap }}{% else %}N/A{% endif %}
{% if ad %}
◻️ <b>Ad:</b> {{ ad }}
{% endif %}
{% if socials %}{% for link in socials %}<a href="{{ link.url }}"><b>{{ link.label }}</b></a>{% if not loop.last %}  {% endif %}{% endfor %}
{% endif %}<a href="{{ links.chart }}"><b>Chart</b></a> | <a href="{{ links.dex }}"><b>{{ dex_label }}</b></a>{% if promo %} | <a href="{{ promo.url }}"><b>{{ promo.label }}</b></a>{% endif %}"#;

/// A rendered alert ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Sanitized HTML body, used as the caption when an image is attached.
    pub text: String,
    /// Image to send with the alert, if the watch's media rules apply.
    pub image: Option<String>,
    /// Lookups that fell back to defaults while building this alert.
    pub degraded: Vec<DegradedField>,
}

/// Renders alerts from a template and static link settings.
///
/// Formatting is deterministic: the same event, context, watch and ad text
/// always produce the same notification.
pub struct NotificationFormatter {
    templates: TemplateService,
    template: String,
    config: NotificationConfig,
}

impl NotificationFormatter {
    /// Creates a formatter, reading `config.template_path` when set.
    pub fn new(config: NotificationConfig) -> Result<Self, FormatError> {
        let template = match &config.template_path {
            Some(path) => std::fs::read_to_string(path).map_err(|source| {
                FormatError::TemplateLoad { path: path.display().to_string(), source }
            })?,
            None => DEFAULT_TEMPLATE.to_string(),
        };
        Ok(Self { templates: TemplateService::new(), template, config })
    }

    fn links(&self, event: &TradeEvent, watch: &Watch) -> Value {
        let explorer = self.config.explorer_url.trim_end_matches('/');
        json!({
            "buyer": escape_html(&format!("{explorer}/address/{}", event.maker)),
            "tx": escape_html(&format!("{explorer}/tx/{}", event.tx_hash)),
            "chart": escape_html(&watch.chart.chart_url(&watch.asset.pair)),
            "dex": escape_html(&format!("{}{}", self.config.dex_url, watch.asset.address)),
        })
    }

    fn socials(watch: &Watch) -> Vec<Value> {
        [
            ("Website", &watch.social.website),
            ("Telegram", &watch.social.telegram),
            ("Twitter", &watch.social.twitter),
        ]
        .into_iter()
        .filter_map(|(label, url)| {
            url.as_deref()
                .map(str::trim)
                .filter(|url| !url.is_empty())
                .map(|url| json!({ "label": label, "url": escape_html(url) }))
        })
        .collect()
    }

    /// Builds the template context. Every string that can carry user or
    /// upstream input is escaped here.
    fn context(
        &self,
        event: &TradeEvent,
        enriched: &EnrichedContext,
        watch: &Watch,
        ad_text: Option<&str>,
    ) -> Value {
        let holder = enriched.holder.as_ref().map(|h| {
            json!({
                "balance": h.balance.to_string(),
                "is_empty": h.balance == 0.0,
                "is_new": h.is_new,
            })
        });
        let market = enriched.market.as_ref().map(|m| {
            json!({ "price": m.price.to_string(), "market_cap": m.market_cap.to_string() })
        });
        let promo = self.config.promo.as_ref().map(|p| {
            json!({ "label": escape_html(&p.label), "url": escape_html(&p.url) })
        });
        let ad = ad_text.map(str::trim).filter(|text| !text.is_empty()).map(escape_html);

        json!({
            "asset": {
                "name": escape_html(&watch.asset.name),
                "symbol": escape_html(&watch.asset.symbol),
            },
            "emoji": escape_html(&watch.emoji),
            "step": watch.step.to_string(),
            "trade": {
                "usd": event.usd_total.to_string(),
                "base": event.base_total.to_string(),
                "maker": escape_html(&event.maker),
            },
            "holders": enriched.holders,
            "holder": holder,
            "market": market,
            "price_precision": self.config.price_precision,
            "ad": ad,
            "socials": Self::socials(watch),
            "links": self.links(event, watch),
            "dex_label": escape_html(&self.config.dex_label),
            "promo": promo,
        })
    }

    /// Renders the alert for one admitted event.
    pub fn format(
        &self,
        event: &TradeEvent,
        enriched: &EnrichedContext,
        watch: &Watch,
        ad_text: Option<&str>,
    ) -> Result<Notification, FormatError> {
        let context = self.context(event, enriched, watch, ad_text);
        let rendered = self.templates.render(&self.template, context)?;

        Ok(Notification {
            text: sanitize_html(&rendered),
            image: watch.media_for(event.usd_total).map(str::to_string),
            degraded: enriched.degraded.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::{
        config::PromoLink,
        models::{HolderStatus, MarketSnapshot, MediaSettings, SocialLinks},
        test_helpers::{TradeEventBuilder, WatchBuilder},
    };

    fn enriched() -> EnrichedContext {
        EnrichedContext {
            holders: 1_234,
            holder: Some(HolderStatus { is_new: true, balance: 1500.5, change_pct: 0.0 }),
            market: Some(MarketSnapshot {
                price: Decimal::new(123, 6),
                market_cap: Decimal::from(1_234_567),
            }),
            degraded: vec![],
        }
    }

    fn formatter() -> NotificationFormatter {
        NotificationFormatter::new(NotificationConfig::default()).unwrap()
    }

    #[test]
    fn test_format_renders_full_alert() {
        let watch = WatchBuilder::new()
            .name("Pepe")
            .symbol("PEPE")
            .step(Decimal::from(50))
            .social(SocialLinks {
                telegram: Some("https://t.me/pepe".to_string()),
                website: Some("https://pepe.vip".to_string()),
                twitter: None,
            })
            .build();
        let event = TradeEventBuilder::new()
            .usd_total(Decimal::from(120))
            .base_total(Decimal::new(5, 2))
            .maker("0x1234567890abcdef1234567890abcdef12345678")
            .tx_hash("0xfeed")
            .build();

        let notification =
            formatter().format(&event, &enriched(), &watch, Some("Trade on X")).unwrap();
        let text = &notification.text;

        assert!(text.starts_with("Pepe <b>BUY ALERT!</b>\n🚀🚀\n"));
        assert!(text.contains("💶 <b>Bought:</b> $120.00 (0.05 ETH)"));
        assert!(text.contains("🪙 <b>Got:</b> 1500.5 PEPE\n"));
        assert!(text.contains(
            r#"<a href="https://etherscan.io/address/0x1234567890abcdef1234567890abcdef12345678">0x...12345678</a>"#
        ));
        assert!(text.contains(r#"<a href="https://etherscan.io/tx/0xfeed">Txn</a>"#));
        assert!(text.contains("🔄 <b>Holder Count:</b> 1234\n✅ <b>New Holder!</b>\n"));
        assert!(text.contains("📈 <b>Price:</b> $0.000123000000000\n"));
        assert!(text.contains("📊 <b>MarketCap:</b> 1.2346M\n"));
        assert!(text.contains("◻️ <b>Ad:</b> Trade on X\n"));
        assert!(text.contains(
            r#"<a href="https://pepe.vip"><b>Website</b></a>  <a href="https://t.me/pepe"><b>Telegram</b></a>"#
        ));
        assert!(text.contains(r#"<a href="https://www.dextools.io/app/es/ether/pair-explorer/"#));
        assert!(text.contains("<b>UniSwap</b></a>"));
        assert!(notification.image.is_none());
    }

    #[test]
    fn test_format_marks_zero_balance_as_mev_bot() {
        let mut context = enriched();
        context.holder = Some(HolderStatus { is_new: false, balance: 0.0, change_pct: -100.0 });

        let notification = formatter()
            .format(&TradeEventBuilder::new().build(), &context, &WatchBuilder::new().build(), None)
            .unwrap();

        assert!(notification.text.contains("&lt;--- MEV Bot"));
        assert!(!notification.text.contains("New Holder!"));
    }

    #[test]
    fn test_format_degraded_market_renders_na() {
        let context = EnrichedContext {
            holders: 1,
            holder: None,
            market: None,
            degraded: vec![DegradedField::Holders, DegradedField::Balance, DegradedField::Market],
        };

        let notification = formatter()
            .format(&TradeEventBuilder::new().build(), &context, &WatchBuilder::new().build(), None)
            .unwrap();

        assert!(notification.text.contains("📈 <b>Price:</b> N/A"));
        assert!(notification.text.contains("📊 <b>MarketCap:</b> N/A"));
        assert!(notification.text.contains("🪙 <b>Got:</b> N/A"));
        assert!(!notification.text.contains("<b>Ad:</b>"));
        assert_eq!(notification.degraded.len(), 3);
    }

    #[test]
    fn test_format_escapes_user_controlled_fields() {
        let watch = WatchBuilder::new()
            .name("<script>alert(1)</script>Evil")
            .emoji("<i>")
            .social(SocialLinks {
                telegram: None,
                website: Some(r#"https://x.io/"><img src=x>"#.to_string()),
                twitter: None,
            })
            .build();

        let notification = formatter()
            .format(
                &TradeEventBuilder::new().build(),
                &enriched(),
                &watch,
                Some("<u>ad</u> & more"),
            )
            .unwrap();
        let text = &notification.text;

        assert!(text.starts_with("&lt;script&gt;alert(1)&lt;/script&gt;Evil <b>BUY ALERT!</b>"));
        assert!(text.contains("&lt;i&gt;"));
        assert!(text.contains("<b>Ad:</b> &lt;u&gt;ad&lt;/u&gt; &amp; more"));
        assert!(text.contains(r#"<a href="https://x.io/&quot;&gt;&lt;img src=x&gt;">"#));
        assert!(!text.contains("<img"));
        assert!(!text.contains("<u>"));
    }

    #[test]
    fn test_format_attaches_media_over_threshold() {
        let watch = WatchBuilder::new()
            .media(MediaSettings {
                enabled: true,
                image: "https://cdn.example/buy.gif".to_string(),
                threshold: Decimal::from(100),
            })
            .build();

        let small = TradeEventBuilder::new().usd_total(Decimal::from(99)).build();
        let large = TradeEventBuilder::new().usd_total(Decimal::from(100)).build();

        let f = formatter();
        assert!(f.format(&small, &enriched(), &watch, None).unwrap().image.is_none());
        assert_eq!(
            f.format(&large, &enriched(), &watch, None).unwrap().image.as_deref(),
            Some("https://cdn.example/buy.gif")
        );
    }

    #[test]
    fn test_format_appends_promo_and_custom_precision() {
        let config = NotificationConfig {
            promo: Some(PromoLink {
                label: "Ares Bot".to_string(),
                url: "https://t.me/ares_trading_bot".to_string(),
            }),
            price_precision: 4,
            ..NotificationConfig::default()
        };
        let formatter = NotificationFormatter::new(config).unwrap();

        let notification = formatter
            .format(&TradeEventBuilder::new().build(), &enriched(), &WatchBuilder::new().build(), None)
            .unwrap();

        assert!(notification.text.ends_with(r#" | <a href="https://t.me/ares_trading_bot"><b>Ares Bot</b></a>"#));
        assert!(notification.text.contains("$0.0001\n"));
    }

    #[test]
    fn test_format_is_deterministic() {
        let f = formatter();
        let event = TradeEventBuilder::new().build();
        let watch = WatchBuilder::new().build();
        let first = f.format(&event, &enriched(), &watch, Some("ad")).unwrap();
        let second = f.format(&event, &enriched(), &watch, Some("ad")).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_custom_template_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alert.j2");
        std::fs::write(&path, "{{ asset.symbol }} {{ holders }}").unwrap();

        let formatter = NotificationFormatter::new(NotificationConfig {
            template_path: Some(path),
            ..NotificationConfig::default()
        })
        .unwrap();

        let notification = formatter
            .format(
                &TradeEventBuilder::new().build(),
                &enriched(),
                &WatchBuilder::new().symbol("TKN").build(),
                None,
            )
            .unwrap();
        assert_eq!(notification.text, "TKN 1234");
    }

    #[test]
    fn test_missing_template_file_is_error() {
        let result = NotificationFormatter::new(NotificationConfig {
            template_path: Some("/definitely/not/here.j2".into()),
            ..NotificationConfig::default()
        });
        assert!(matches!(result, Err(FormatError::TemplateLoad { .. })));
    }
}

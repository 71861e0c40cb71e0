//! 术语表解析服务 - 业务能力层
//!
//! 解析规则（确定性）：
//! 1. 请求里显式指定了术语表 id → 无条件使用（可见性校验由被排除的
//!    访问控制协作方负责）
//! 2. 否则取匹配 行业 + 语言对 的系统术语表
//! 3. 没有再回退到同语言对的 general 行业术语表
//! 4. 还没有就空着继续——不产出术语一致性问题，但这不是错误

use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use crate::error::AuditResult;
use crate::models::glossary::{Glossary, GlossaryTerm};
use crate::store::GlossaryStore;

/// 兜底行业标签
const GENERAL_INDUSTRY: &str = "general";

/// 术语表解析服务
pub struct GlossaryService {
    store: Arc<dyn GlossaryStore>,
}

impl GlossaryService {
    pub fn new(store: Arc<dyn GlossaryStore>) -> Self {
        Self { store }
    }

    /// 解析本次审计适用的术语表
    pub async fn resolve(
        &self,
        industry: Option<&str>,
        source_language: Option<&str>,
        target_language: Option<&str>,
        explicit_id: Option<Uuid>,
    ) -> AuditResult<Option<Glossary>> {
        // 显式指定的术语表优先级最高
        if let Some(id) = explicit_id {
            let glossary = self.store.get(id).await?;
            info!("📖 使用指定术语表: {} ({} 条术语)", glossary.name, glossary.terms.len());
            return Ok(Some(glossary));
        }

        let (source_language, target_language) = match (source_language, target_language) {
            (Some(s), Some(t)) => (s, t),
            // 语言对不完整时无法匹配系统术语表
            _ => {
                debug!("语言对不完整，跳过术语表解析");
                return Ok(None);
            }
        };

        if let Some(industry) = industry {
            let industry = industry.trim().to_lowercase();
            if let Some(glossary) = self
                .store
                .find_system(&industry, source_language, target_language)
                .await?
            {
                info!(
                    "📖 命中行业术语表: {} [{}] ({} 条术语)",
                    glossary.name,
                    industry,
                    glossary.terms.len()
                );
                return Ok(Some(glossary));
            }
        }

        // 行业没有命中，回退到 general
        if let Some(glossary) = self
            .store
            .find_system(GENERAL_INDUSTRY, source_language, target_language)
            .await?
        {
            info!(
                "📖 回退到通用术语表: {} ({} 条术语)",
                glossary.name,
                glossary.terms.len()
            );
            return Ok(Some(glossary));
        }

        debug!(
            "未找到 {} → {} 的系统术语表，不做术语校验",
            source_language, target_language
        );
        Ok(None)
    }
}

// ========== 系统术语表播种 ==========

fn term(source: &str, target: &str, context: &str) -> GlossaryTerm {
    GlossaryTerm {
        source_term: source.to_string(),
        target_term: target.to_string(),
        context: Some(context.to_string()),
        notes: None,
    }
}

fn ecommerce_terms() -> Vec<GlossaryTerm> {
    vec![
        term("Add to Cart", "장바구니에 담기", "Button to add item to shopping cart"),
        term("Checkout", "결제하기", "Process to complete purchase"),
        term("Shopping Cart", "장바구니", "Collection of items to purchase"),
        term("Wishlist", "위시리스트", "Saved items for later"),
        term("Free Shipping", "무료 배송", "No delivery charge"),
        term("Return Policy", "반품 정책", "Rules for returning items"),
        term("Out of Stock", "품절", "Item not available"),
        term("Sale", "할인", "Discounted price"),
        term("Order Confirmation", "주문 확인", "Purchase verification"),
        term("Refund", "환불", "Money returned for return"),
    ]
}

fn adtech_terms() -> Vec<GlossaryTerm> {
    vec![
        term("Impressions", "노출수", "Number of times ad was displayed"),
        term("Click-Through Rate (CTR)", "클릭률(CTR)", "Clicks divided by impressions"),
        term("Conversion", "전환", "Desired action completed"),
        term("Cost Per Click (CPC)", "클릭당 비용(CPC)", "Price per ad click"),
        term("Target Audience", "타겟 오디언스", "Intended ad recipients"),
        term("Landing Page", "랜딩 페이지", "Page after ad click"),
        term("Call to Action (CTA)", "행동 유도 문구(CTA)", "Prompt to take action"),
        term("Bounce Rate", "이탈률", "Single-page visit rate"),
        term("Retargeting", "리타겟팅", "Ads to previous visitors"),
        term("Campaign", "캠페인", "Marketing initiative"),
    ]
}

fn wellness_terms() -> Vec<GlossaryTerm> {
    vec![
        term("Dietary Supplement", "건강보조식품", "Nutritional product"),
        term("Serving Size", "1회 섭취량", "Recommended portion"),
        term("Active Ingredient", "유효 성분", "Primary effective component"),
        term("Gluten-Free", "글루텐 프리", "Contains no gluten"),
        term("Disclaimer", "면책 조항", "Legal notice about claims"),
        term("Consult your doctor", "의사와 상담하세요", "Medical advice notice"),
        term("Side Effects", "부작용", "Possible adverse reactions"),
        term("Dosage", "복용량", "Amount to take"),
        term("Immune Support", "면역력 지원", "Immunity benefits"),
        term("Results may vary", "개인차가 있을 수 있습니다", "Individual outcome disclaimer"),
    ]
}

fn general_terms() -> Vec<GlossaryTerm> {
    vec![
        term("Sign Up", "회원가입", "Create a new account"),
        term("Log In", "로그인", "Access an existing account"),
        term("Contact Us", "문의하기", "Reach customer support"),
        term("Privacy Policy", "개인정보 처리방침", "Data handling notice"),
        term("Terms of Service", "이용약관", "Usage agreement"),
        term("Learn More", "자세히 보기", "Link to details"),
        term("Subscribe", "구독하기", "Join a mailing list"),
        term("FAQ", "자주 묻는 질문", "Frequently asked questions"),
    ]
}

/// 播种系统内置术语表（已存在同行业/语言对的不重复播种）
pub async fn seed_system_glossaries(store: &dyn GlossaryStore) -> AuditResult<()> {
    let seeds = [
        (
            "E-commerce Standard Terms",
            "Common terminology for online retail and shopping websites",
            "ecommerce",
            ecommerce_terms(),
        ),
        (
            "Ad Tech Standard Terms",
            "Digital advertising and marketing terminology",
            "adtech",
            adtech_terms(),
        ),
        (
            "Wellness & Health Standard Terms",
            "Health, wellness, and supplement industry terminology",
            "wellness",
            wellness_terms(),
        ),
        (
            "General Web Terms",
            "Common website terminology across industries",
            GENERAL_INDUSTRY,
            general_terms(),
        ),
    ];

    let mut seeded = 0usize;
    for (name, description, industry, terms) in seeds {
        if store.find_system(industry, "en", "ko").await?.is_some() {
            continue;
        }
        store
            .insert(Glossary::system(name, description, industry, "en", "ko", terms))
            .await?;
        seeded += 1;
    }

    if seeded > 0 {
        info!("✓ 播种了 {} 个系统术语表", seeded);
    }
    Ok(())
}

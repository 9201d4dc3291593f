//! max_tokens 截断续写：模型因输出预算被截断时投 Continue，让下一轮接着写

use async_trait::async_trait;

use crate::core::AgentError;
use crate::pipeline::{Interceptor, InterceptorContext, LoopDecision};

pub struct MaxTokensInterceptor;

#[async_trait]
impl Interceptor for MaxTokensInterceptor {
    fn name(&self) -> &str {
        "max_tokens"
    }

    async fn intercept(&self, ctx: &InterceptorContext<'_>) -> Result<LoopDecision, AgentError> {
        if ctx.stop_reason.is_truncated() {
            tracing::info!("response truncated by max_tokens, continuing");
            Ok(LoopDecision::Continue)
        } else {
            Ok(LoopDecision::Complete)
        }
    }
}

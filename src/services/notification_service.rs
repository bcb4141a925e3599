//! services/notification_service.rs
//! Aviso por correo de cada consulta nueva.
//!
//! Ningún error sale de aquí: `notify` devuelve `false` y lo deja en el log.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::config::app_config::MailConfig;
use crate::models::consultation_model::ConsultationRecord;

#[async_trait]
pub trait Notifier: Send + Sync {
    /// `true` si el aviso salió; cualquier fallo se registra y devuelve `false`.
    async fn notify(&self, record: &ConsultationRecord) -> bool;
}

/// Elige el notificador según haya o no credenciales SMTP.
pub fn build_notifier(config: &MailConfig) -> Arc<dyn Notifier> {
    if config.is_configured() {
        log::info!(
            "Avisos por correo activos: {} -> {} via {}:{}",
            config.sender_email,
            config.recipient_email,
            config.smtp_host,
            config.smtp_port
        );
        Arc::new(EmailNotifier::new(config.clone()))
    } else {
        log::warn!("SENDER_EMAIL/SENDER_PASSWORD/RECIPIENT_EMAIL sin configurar; no se enviarán avisos");
        Arc::new(DisabledNotifier)
    }
}

/// Asunto y cuerpo (texto plano) del aviso.
pub fn compose_message(record: &ConsultationRecord) -> (String, String) {
    let subject = format!("新的咨询表单 - {}", record.name);
    let or_dash = |v: &Option<String>| v.clone().filter(|s| !s.is_empty());

    let body = format!(
        "新的咨询表单提交：\n\
         编号: {id}\n\
         姓名: {name}\n\
         联系方式: {contact}\n\
         邮箱: {email}\n\
         咨询类型: {kind}\n\
         咨询内容: {message}\n\
         提交时间: {submitted_at}\n\
         状态: {status}\n\
         设备: {device}\n\
         IP: {ip}\n\
         位置: {location}\n\
         浏览器: {browser}\n\
         填写时长: {duration}\n",
        id = record.id,
        name = record.name,
        contact = record.contact,
        email = or_dash(&record.email).unwrap_or_else(|| "未提供".to_string()),
        kind = record.consultation_type,
        message = or_dash(&record.message).unwrap_or_else(|| "无".to_string()),
        submitted_at = record.submitted_at,
        status = record.status,
        device = or_dash(&record.device_model).unwrap_or_else(|| "-".to_string()),
        ip = or_dash(&record.ip_address).unwrap_or_else(|| "-".to_string()),
        location = or_dash(&record.location).unwrap_or_else(|| "-".to_string()),
        browser = or_dash(&record.browser).unwrap_or_else(|| "-".to_string()),
        duration = record
            .fill_duration
            .map(|s| format!("{s} 秒"))
            .unwrap_or_else(|| "-".to_string()),
    );

    (subject, body)
}

#[derive(Debug, Clone)]
pub struct EmailNotifier {
    config: MailConfig,
}

impl EmailNotifier {
    pub fn new(config: MailConfig) -> Self {
        Self { config }
    }

    async fn send_via_smtp(&self, record: &ConsultationRecord) -> Result<()> {
        let from: Mailbox = self
            .config
            .sender_email
            .parse()
            .context("Invalid from address")?;
        let to: Mailbox = self
            .config
            .recipient_email
            .parse()
            .context("Invalid recipient address")?;

        let (subject, body) = compose_message(record);
        let message = Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body)
            .context("No se pudo construir el mensaje")?;

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.smtp_host)?
            .port(self.config.smtp_port)
            .credentials(Credentials::new(
                self.config.sender_email.clone(),
                self.config.sender_password.clone(),
            ))
            .build();

        tokio::time::timeout(
            Duration::from_secs(self.config.timeout_secs),
            mailer.send(message),
        )
        .await
        .context("Timeout enviando correo")??;

        Ok(())
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn notify(&self, record: &ConsultationRecord) -> bool {
        match self.send_via_smtp(record).await {
            Ok(()) => {
                log::info!("Aviso de consulta {} enviado a {}", record.id, self.config.recipient_email);
                true
            }
            Err(e) => {
                log::warn!("No se pudo enviar aviso de consulta {}: {:#}", record.id, e);
                false
            }
        }
    }
}

/// Sin credenciales: no envía nada.
#[derive(Debug, Clone, Copy)]
pub struct DisabledNotifier;

#[async_trait]
impl Notifier for DisabledNotifier {
    async fn notify(&self, record: &ConsultationRecord) -> bool {
        log::debug!("Aviso de consulta {} omitido (correo no configurado)", record.id);
        false
    }
}
